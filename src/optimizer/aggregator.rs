//! # Result Aggregator
//!
//! Unico punto di mutazione del run: riceve gli eventi dei worker su un canale
//! e aggiorna contatori, stato per file e `FingerprintStore`.
//!
//! ## Responsabilità:
//! - Transizioni `Pending → Running → {Succeeded, Failed, SkippedOnCancel}`
//! - Byte risparmiati (mai negativi per singolo file)
//! - Fingerprint aggiornato solo per i successi, letto dopo il tool esterno
//! - Flush incrementale dello stato ogni `flush_interval` successi e alla fine
//! - Fail fast: al primo tool mancante cancella il dispatch
//!
//! I worker non condividono nulla di mutabile: ogni aggiornamento passa da qui.

use crate::{
    json_output::JsonMessage,
    optimizer::task_optimizer::{TaskOutcome, TaskStatus},
    path_key::PathKey,
    planner::WorkItem,
    progress::{FailureRecord, ItemState, ProgressManager, RunResult},
    state::FingerprintStore,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Messages from workers to the aggregator
#[derive(Debug)]
pub enum AggregatorEvent {
    Started { item: WorkItem, worker_id: usize },
    Finished(TaskOutcome),
}

pub struct Aggregator {
    store: FingerprintStore,
    result: RunResult,
    state_path: PathBuf,
    flush_interval: usize,
    successes_since_flush: usize,
    dirty: bool,
    running: HashMap<PathKey, (PathBuf, usize)>,
    progress: Option<ProgressManager>,
    abort: Option<CancellationToken>,
    json_output: bool,
}

impl Aggregator {
    /// Track every planned item as `Pending`
    pub fn new(
        store: FingerprintStore,
        mut result: RunResult,
        work: &[WorkItem],
        state_path: PathBuf,
        flush_interval: usize,
    ) -> Self {
        for item in work {
            result.items.insert(item.key.clone(), ItemState::Pending);
        }

        Self {
            store,
            result,
            state_path,
            flush_interval,
            successes_since_flush: 0,
            dirty: false,
            running: HashMap::new(),
            progress: None,
            abort: None,
            json_output: false,
        }
    }

    pub fn with_progress(mut self, progress: ProgressManager) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Token cancelled when a missing optimizer makes further work pointless
    pub fn with_abort_token(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.json_output = enabled;
        self
    }

    /// Consume events until every sender is gone, then settle and save.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<AggregatorEvent>,
    ) -> (RunResult, FingerprintStore) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        self.finish().await
    }

    pub async fn handle(&mut self, event: AggregatorEvent) {
        match event {
            AggregatorEvent::Started { item, worker_id } => {
                self.result.items.insert(item.key.clone(), ItemState::Running);
                self.running.insert(item.key, (item.path, worker_id));
            }
            AggregatorEvent::Finished(outcome) => self.record(outcome).await,
        }
    }

    async fn record(&mut self, outcome: TaskOutcome) {
        self.running.remove(&outcome.key);
        if let Some(progress) = &self.progress {
            progress.update(outcome.key.as_str());
        }

        if let Some(warning) = &outcome.warning {
            warn!("{}: {}", outcome.path.display(), warning);
            self.result
                .warnings
                .push(format!("{}: {}", outcome.path.display(), warning));
        }

        match outcome.status {
            TaskStatus::Succeeded {
                optimized_size,
                fingerprint,
            } => {
                self.result.items.insert(outcome.key.clone(), ItemState::Succeeded);
                self.result.succeeded += 1;
                self.result.original_bytes += outcome.original_size;
                self.result.bytes_saved += outcome.original_size.saturating_sub(optimized_size);
                debug!(
                    "{} optimized by worker {} in {:?}: {} -> {}",
                    outcome.key, outcome.worker_id, outcome.elapsed, outcome.original_size, optimized_size
                );

                if self.json_output {
                    JsonMessage::file_complete(
                        outcome.key.clone(),
                        outcome.worker_id,
                        outcome.original_size,
                        Some(optimized_size),
                        None,
                    )
                    .emit();
                }

                if let Some(fingerprint) = fingerprint {
                    self.store.insert(outcome.key, fingerprint);
                    self.dirty = true;
                    self.successes_since_flush += 1;
                    if self.flush_interval > 0 && self.successes_since_flush >= self.flush_interval {
                        self.flush().await;
                    }
                }
            }
            TaskStatus::Failed {
                diagnostic,
                missing_tool,
            } => {
                self.result.items.insert(outcome.key.clone(), ItemState::Failed);
                self.result.failed += 1;

                let command_line = outcome.command_line.as_deref().unwrap_or("<not started>");
                error!(
                    "Failed {} (worker {})\n  command: {}\n  {}",
                    outcome.path.display(),
                    outcome.worker_id,
                    command_line,
                    diagnostic
                );

                if self.json_output {
                    JsonMessage::file_complete(
                        outcome.key.clone(),
                        outcome.worker_id,
                        outcome.original_size,
                        None,
                        Some(diagnostic.clone()),
                    )
                    .emit();
                }

                if missing_tool && self.result.aborted_reason.is_none() {
                    error!("Optimizer executable is missing; no further files will be started");
                    self.result.aborted_reason = Some(diagnostic.clone());
                    if let Some(abort) = &self.abort {
                        abort.cancel();
                    }
                }

                self.result.failures.push(FailureRecord {
                    path: outcome.path,
                    key: outcome.key,
                    worker_id: outcome.worker_id,
                    command_line: outcome.command_line,
                    diagnostic,
                });
            }
        }
    }

    /// Write the store now; a failure is logged and the run goes on
    async fn flush(&mut self) {
        self.successes_since_flush = 0;
        match self.store.save(&self.state_path).await {
            Ok(()) => self.dirty = false,
            Err(e) => {
                warn!("Could not save state: {}", e);
                self.result.warnings.push(format!("Could not save state: {}", e));
            }
        }
    }

    async fn finish(mut self) -> (RunResult, FingerprintStore) {
        for (key, (path, worker_id)) in std::mem::take(&mut self.running) {
            let diagnostic = "worker stopped before reporting a result".to_string();
            error!("Failed {} (worker {}): {}", path.display(), worker_id, diagnostic);
            self.result.items.insert(key.clone(), ItemState::Failed);
            self.result.failed += 1;
            self.result.failures.push(FailureRecord {
                path,
                key,
                worker_id,
                command_line: None,
                diagnostic,
            });
        }

        for state in self.result.items.values_mut() {
            if *state == ItemState::Pending {
                *state = ItemState::SkippedOnCancel;
                self.result.skipped_on_cancel += 1;
            }
        }

        if self.dirty {
            self.flush().await;
        }

        (self.result, self.store)
    }
}
