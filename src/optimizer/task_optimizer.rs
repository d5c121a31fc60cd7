//! # Task Optimizer Module
//!
//! Worker per l'ottimizzazione di singoli file.
//! Separato dal dispatcher per poter essere testato con un tool finto.
//!
//! ## Pipeline per file:
//! 1. Legge la dimensione originale
//! 2. Rinomina verso un nome surrogato se il nome non è indirizzabile (`SafeName`)
//! 3. Esegue il tool esterno sul path target
//! 4. Ripristina sempre il nome originale, qualunque sia l'esito del tool
//! 5. Rilegge dimensione e fingerprint *dopo* il tool
//!
//! Nessun errore attraversa il confine del worker: tutto diventa un `TaskOutcome`.

use crate::{
    error::OptimizeError,
    file_manager::FileManager,
    image_processor::ExternalCommand,
    path_key::PathKey,
    planner::WorkItem,
    safe_name::SafeName,
    state::Fingerprint,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Esito di un singolo file
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Succeeded {
        optimized_size: u64,
        /// Post-run fingerprint; `None` when the file could not be put back
        /// under its original name
        fingerprint: Option<Fingerprint>,
    },
    Failed {
        diagnostic: String,
        missing_tool: bool,
    },
}

/// Report sent from a worker to the aggregator
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub key: PathKey,
    pub path: PathBuf,
    pub worker_id: usize,
    pub original_size: u64,
    pub command_line: Option<String>,
    pub elapsed: Duration,
    /// Problem worth surfacing even though the file succeeded
    pub warning: Option<String>,
    pub status: TaskStatus,
}

impl TaskOutcome {
    fn new(item: &WorkItem, worker_id: usize) -> Self {
        Self {
            key: item.key.clone(),
            path: item.path.clone(),
            worker_id,
            original_size: 0,
            command_line: None,
            elapsed: Duration::ZERO,
            warning: None,
            status: TaskStatus::Failed {
                diagnostic: String::new(),
                missing_tool: false,
            },
        }
    }

    fn failed(mut self, diagnostic: String, missing_tool: bool) -> Self {
        self.status = TaskStatus::Failed {
            diagnostic,
            missing_tool,
        };
        self
    }

    fn failed_with(self, error: &OptimizeError) -> Self {
        self.failed(error.to_string(), error.is_missing_tool())
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded { .. })
    }
}

/// Worker ottimizzato per elaborazione singoli file
pub struct TaskOptimizer<T: ExternalCommand> {
    tool: Arc<T>,
    path_limit: usize,
}

impl<T: ExternalCommand> TaskOptimizer<T> {
    pub fn new(tool: Arc<T>, path_limit: usize) -> Self {
        Self { tool, path_limit }
    }

    /// Processa un singolo file
    pub async fn process(&self, item: &WorkItem, worker_id: usize) -> TaskOutcome {
        let outcome = TaskOutcome::new(item, worker_id);

        let original_size = match FileManager::get_file_info(&item.path).await {
            Ok((size, _)) => size,
            Err(e) => return outcome.failed_with(&OptimizeError::Io(e)),
        };
        let mut outcome = TaskOutcome {
            original_size,
            ..outcome
        };

        let safe = match SafeName::acquire(&item.path, self.path_limit).await {
            Ok(safe) => safe,
            Err(e) => return outcome.failed_with(&e),
        };

        let target = safe.target().to_path_buf();
        outcome.command_line = Some(self.tool.command_line(&target));
        debug!("[worker {}] {}", worker_id, item.key);

        let run = self.tool.run(&target).await;

        // The name goes back before anything else, success or not
        let restore_warning = safe.restore().await.err().map(|e| e.to_string());

        let output = match run {
            Ok(output) => output,
            Err(e) => {
                let diagnostic = with_note(e.to_string(), restore_warning.as_deref());
                return outcome.failed(diagnostic, e.is_missing_tool());
            }
        };
        outcome.elapsed = output.elapsed;

        if !output.success {
            let diagnostic = with_note(output.diagnostic(), restore_warning.as_deref());
            return outcome.failed(diagnostic, false);
        }

        let restored = restore_warning.is_none();
        let current_path = if restored { &item.path } else { &target };
        match FileManager::get_file_info(current_path).await {
            Ok((optimized_size, fingerprint)) => {
                outcome.warning = restore_warning;
                outcome.status = TaskStatus::Succeeded {
                    optimized_size,
                    fingerprint: restored.then_some(fingerprint),
                };
                outcome
            }
            Err(e) => {
                let diagnostic = format!(
                    "optimizer succeeded but {} cannot be read: {}",
                    current_path.display(),
                    e
                );
                outcome.failed(with_note(diagnostic, restore_warning.as_deref()), false)
            }
        }
    }
}

fn with_note(diagnostic: String, note: Option<&str>) -> String {
    match note {
        Some(note) => format!("{} ({})", diagnostic, note),
        None => diagnostic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processor::ToolOutput;
    use std::path::Path;
    use tempfile::TempDir;

    /// Truncates the target to a few bytes, or fails when the name says so
    struct Shrinker;

    impl ExternalCommand for Shrinker {
        fn command_line(&self, target: &Path) -> String {
            format!("shrink {}", target.display())
        }

        async fn run(&self, target: &Path) -> Result<ToolOutput, OptimizeError> {
            let name = target.file_name().unwrap().to_string_lossy().to_string();
            let success = !name.contains("bad");
            if success {
                tokio::fs::write(target, b"tiny").await?;
            }
            Ok(ToolOutput {
                success,
                exit_code: Some(if success { 0 } else { 1 }),
                stdout: String::new(),
                stderr: if success { String::new() } else { format!("{}: not a PNG", name) },
                elapsed: Duration::from_millis(1),
            })
        }
    }

    fn item(root: &Path, name: &str, content: &[u8]) -> WorkItem {
        let path = root.join(name);
        std::fs::write(&path, content).unwrap();
        WorkItem {
            key: PathKey::from_path(&path, root).unwrap(),
            path,
        }
    }

    #[tokio::test]
    async fn test_success_reports_sizes_and_fresh_fingerprint() {
        let dir = TempDir::new().unwrap();
        let item = item(dir.path(), "a.png", &[0u8; 100]);
        let optimizer = TaskOptimizer::new(Arc::new(Shrinker), 4096);

        let outcome = optimizer.process(&item, 3).await;
        assert_eq!(outcome.worker_id, 3);
        assert_eq!(outcome.original_size, 100);
        let fresh = Fingerprint::from_metadata(&std::fs::metadata(&item.path).unwrap()).unwrap();
        assert_eq!(
            outcome.status,
            TaskStatus::Succeeded {
                optimized_size: 4,
                fingerprint: Some(fresh)
            }
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_command_line_and_diagnostic() {
        let dir = TempDir::new().unwrap();
        let item = item(dir.path(), "bad.png", b"data");
        let optimizer = TaskOptimizer::new(Arc::new(Shrinker), 4096);

        let outcome = optimizer.process(&item, 1).await;
        assert!(!outcome.is_success());
        assert!(outcome.command_line.unwrap().contains("bad.png"));
        match outcome.status {
            TaskStatus::Failed {
                diagnostic,
                missing_tool,
            } => {
                assert!(diagnostic.contains("not a PNG"));
                assert!(!missing_tool);
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_ascii_name_runs_under_surrogate_and_is_restored() {
        let dir = TempDir::new().unwrap();
        let item = item(dir.path(), "résumé.png", &[0u8; 50]);
        let optimizer = TaskOptimizer::new(Arc::new(Shrinker), 4096);

        let outcome = optimizer.process(&item, 1).await;
        assert!(outcome.is_success());
        assert!(outcome.command_line.unwrap().contains(".pngopt-"));
        assert_eq!(std::fs::read(&item.path).unwrap(), b"tiny");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_vanished_file_fails_without_running_tool() {
        let dir = TempDir::new().unwrap();
        let item = item(dir.path(), "gone.png", b"data");
        std::fs::remove_file(&item.path).unwrap();
        let optimizer = TaskOptimizer::new(Arc::new(Shrinker), 4096);

        let outcome = optimizer.process(&item, 1).await;
        assert!(!outcome.is_success());
        assert!(outcome.command_line.is_none());
    }
}
