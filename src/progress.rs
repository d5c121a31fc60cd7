//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e il risultato aggregato di un run.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Stato per singolo file (`ItemState`) durante e dopo il dispatch
//! - `RunResult`: contatori, byte risparmiati, failure dettagliate e warning
//! - Report finale human-readable
//!
//! ## Statistiche tracciate:
//! - **discovered**: File candidati trovati sotto la radice
//! - **skipped**: File invariati dall'ultimo successo
//! - **removed**: Entry eliminate dallo stato perché il file non esiste più
//! - **planned**: File messi in coda per il tool esterno
//! - **succeeded / failed / skipped_on_cancel**: Esito di ogni file pianificato
//! - **bytes_saved**: Byte risparmiati (mai negativo per singolo file)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [=========>------------------] 45/120 (37%) icons/logo.png
//! ```

use crate::file_manager::FileManager;
use crate::path_key::PathKey;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Manages the progress bar shown while files are optimized
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager; `hidden` suppresses all drawing
    pub fn new(total_files: u64, hidden: bool) -> Self {
        if hidden {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_files);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Per-file lifecycle during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Running,
    Succeeded,
    Failed,
    SkippedOnCancel,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::SkippedOnCancel)
    }
}

/// Details of one failed file
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub path: PathBuf,
    pub key: PathKey,
    pub worker_id: usize,
    /// Command line that reproduces the failure
    pub command_line: Option<String>,
    /// Raw tool output or the error that stopped the file
    pub diagnostic: String,
}

/// Aggregated outcome of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub discovered: usize,
    pub skipped: usize,
    pub removed: usize,
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_on_cancel: usize,
    pub bytes_saved: u64,
    pub original_bytes: u64,
    pub failures: Vec<FailureRecord>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
    /// Set when the run stopped dispatching on its own (missing optimizer)
    pub aborted_reason: Option<String>,
    pub elapsed_seconds: f64,
    pub items: BTreeMap<PathKey, ItemState>,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files that reached the optimizer, whatever the outcome
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(
            self.original_bytes,
            self.original_bytes.saturating_sub(self.bytes_saved),
        )
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Optimized: {} | Unchanged: {} | Failed: {} | Not started: {} | Total saved: {} ({:.2}%)",
            self.processed(),
            self.succeeded,
            self.skipped,
            self.failed,
            self.skipped_on_cancel,
            FileManager::format_size(self.bytes_saved),
            self.overall_reduction_percent()
        )
    }
}
