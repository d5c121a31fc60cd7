//! # Batch Optimizer Main Orchestrator
//!
//! Orchestratore di un run completo: discovery → planning → dispatch →
//! aggregazione → persistence.
//!
//! ## Flusso di esecuzione:
//! 1. **Discovery**: file candidati sotto la radice
//! 2. **Load + planning**: confronto con lo stato persistito
//! 3. **Reconcile**: elimina le entry di file spariti (salvataggio immediato)
//! 4. **Dispatch**: worker pool con cancellazione cooperativa
//! 5. **Aggregazione**: contatori, failure, flush incrementale dello stato
//! 6. **Reporting**: statistiche finali (testo o JSON)
//!
//! ## Error handling:
//! - Radice non valida o configurazione errata: errore prima di qualsiasi lavoro
//! - Errori per singolo file: nel `RunResult`, mai propagati
//! - Errori di scrittura dello stato: warning, il run continua

use crate::{
    config::Config,
    error::OptimizeError,
    file_manager::{DiscoveryOptions, FileManager},
    image_processor::{ExternalCommand, ImageProcessor},
    json_output::JsonMessage,
    optimizer::{
        aggregator::Aggregator, dispatcher::WorkerPool, task_optimizer::TaskOptimizer,
    },
    planner::Plan,
    progress::{ProgressManager, RunResult},
    state::FingerprintStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Orchestratore principale
pub struct BatchOptimizer<T: ExternalCommand = ImageProcessor> {
    config: Config,
    root: PathBuf,
    tool: Arc<T>,
}

impl BatchOptimizer<ImageProcessor> {
    /// Crea un orchestratore che usa optipng come tool esterno
    pub fn new(root: &Path, config: Config) -> Result<Self, OptimizeError> {
        let tool = ImageProcessor::new(&config);
        debug!(
            "Optimizer: {} {} (found: {})",
            tool.program().display(),
            tool.args().join(" "),
            tool.is_available()
        );
        Self::with_tool(root, config, tool)
    }
}

impl<T: ExternalCommand> BatchOptimizer<T> {
    /// Crea un orchestratore con un tool esterno arbitrario
    pub fn with_tool(root: &Path, config: Config, tool: T) -> Result<Self, OptimizeError> {
        config.validate()?;

        if !root.is_dir() {
            return Err(OptimizeError::Configuration(format!(
                "Directory '{}' not found.",
                root.display()
            )));
        }
        let root = root.canonicalize().map_err(|e| {
            OptimizeError::Configuration(format!("Cannot resolve '{}': {}", root.display(), e))
        })?;

        Ok(Self {
            config,
            root,
            tool: Arc::new(tool),
        })
    }

    /// Esegue un run completo
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunResult, OptimizeError> {
        let start_time = Instant::now();
        let mut result = RunResult::new();

        let options = DiscoveryOptions::from_config(&self.config)?;
        let discovery = FileManager::discover(&self.root, &options)?;
        result.discovered = discovery.files.len();
        if discovery.inaccessible > 0 {
            result
                .warnings
                .push(format!("{} entries could not be read and were skipped", discovery.inaccessible));
        }
        for stranded in &discovery.stranded {
            result.warnings.push(format!(
                "{} is still under a temporary name from an interrupted run",
                stranded.display()
            ));
        }

        let state_path = self.config.state_file_path(&self.root);
        let store = FingerprintStore::load(&state_path).await;
        let plan = Plan::build(&self.root, &discovery.files, &store)?;
        result.skipped = plan.skipped;
        result.planned = plan.work.len();

        let (store, removed) = store.reconcile(&plan.live_keys);
        result.removed = removed;
        if removed > 0 {
            info!("Removed {} entries for files that no longer exist", removed);
            if !self.config.dry_run {
                if let Err(e) = store.save(&state_path).await {
                    warn!("Could not save pruned state: {}", e);
                    result.warnings.push(format!("Could not save pruned state: {}", e));
                }
            }
        }

        self.emit_start_message(&result);

        if plan.work.is_empty() || self.config.dry_run {
            if self.config.dry_run {
                for item in &plan.work {
                    info!("Would optimize {}", item.key);
                }
            } else if !self.config.json_output {
                info!("Nothing to do: all {} files are up to date", result.skipped);
            }
            result.elapsed_seconds = start_time.elapsed().as_secs_f64();
            self.print_final_stats(&result);
            return Ok(result);
        }

        let progress = ProgressManager::new(plan.work.len() as u64, self.config.json_output);
        let run_token = cancel.child_token();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let aggregator = Aggregator::new(
            store,
            result,
            &plan.work,
            state_path,
            self.config.flush_interval,
        )
        .with_progress(progress.clone())
        .with_abort_token(run_token.clone())
        .with_json_output(self.config.json_output);
        let aggregator = tokio::spawn(aggregator.run(events_rx));

        let pool = WorkerPool::new(
            TaskOptimizer::new(Arc::clone(&self.tool), self.config.path_limit()),
            self.config.workers,
        );
        let dispatched = pool.dispatch(plan.work, events_tx, &run_token).await;
        debug!("Dispatched {} files", dispatched);

        let (mut result, _store) = aggregator.await?;
        // An interrupt that arrives after the last file started changes nothing
        result.cancelled = cancel.is_cancelled() && result.skipped_on_cancel > 0;
        result.elapsed_seconds = start_time.elapsed().as_secs_f64();

        progress.finish(&result.format_summary());
        self.print_final_stats(&result);

        Ok(result)
    }

    /// Invia messaggio di inizio
    fn emit_start_message(&self, result: &RunResult) {
        if self.config.json_output {
            JsonMessage::start(
                self.root.clone(),
                result.discovered,
                result.planned,
                &self.config,
            )
            .emit();
        } else {
            info!("Starting PNG optimization in: {}", self.root.display());
            info!(
                "Found {} files: {} to optimize, {} unchanged",
                result.discovered, result.planned, result.skipped
            );
            if self.config.dry_run {
                info!("Dry run mode: No files will be modified");
            }
        }
    }

    /// Stampa statistiche finali
    fn print_final_stats(&self, result: &RunResult) {
        if self.config.json_output {
            JsonMessage::complete(result).emit();
            return;
        }

        info!("=== Optimization Complete ===");
        info!("Processed: {}", result.processed());
        info!("Succeeded: {}", result.succeeded);
        info!("Failed: {}", result.failed);
        info!("Unchanged (skipped): {}", result.skipped);
        if result.removed > 0 {
            info!("Removed from state: {}", result.removed);
        }
        if result.skipped_on_cancel > 0 {
            info!("Not started: {}", result.skipped_on_cancel);
        }
        info!(
            "Total saved: {} ({:.2}%)",
            FileManager::format_size(result.bytes_saved),
            result.overall_reduction_percent()
        );
        info!("Elapsed: {:.2}s", result.elapsed_seconds);

        if result.cancelled {
            warn!("Run was interrupted; unfinished files will be picked up next time");
        }
        if let Some(reason) = &result.aborted_reason {
            warn!("Run stopped early: {}", reason);
        }
        for warning in &result.warnings {
            warn!("{}", warning);
        }
    }
}
