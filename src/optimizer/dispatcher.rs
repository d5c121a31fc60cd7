//! # Worker Pool Dispatcher
//!
//! N worker long-lived (id `1..=N`) in un `JoinSet`, alimentati da un canale
//! bounded. Il dispatcher si blocca quando tutti i worker sono occupati.
//!
//! ## Cancellazione cooperativa:
//! - Il token viene controllato prima di inviare ogni file e di nuovo dal worker
//!   prima di avviarlo
//! - I file già avviati terminano normalmente: il tool esterno non viene mai ucciso
//! - I file mai avviati restano `Pending` e l'aggregator li segna `SkippedOnCancel`

use crate::{
    image_processor::ExternalCommand,
    optimizer::{aggregator::AggregatorEvent, task_optimizer::TaskOptimizer},
    planner::WorkItem,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub struct WorkerPool<T: ExternalCommand> {
    optimizer: Arc<TaskOptimizer<T>>,
    workers: usize,
}

impl<T: ExternalCommand> WorkerPool<T> {
    pub fn new(optimizer: TaskOptimizer<T>, workers: usize) -> Self {
        Self {
            optimizer: Arc::new(optimizer),
            workers: workers.max(1),
        }
    }

    /// Feed `work` to the workers until it runs out or `cancel` fires.
    ///
    /// Returns the number of items handed to a worker once every worker has
    /// drained and exited.
    pub async fn dispatch(
        &self,
        work: Vec<WorkItem>,
        events: mpsc::UnboundedSender<AggregatorEvent>,
        cancel: &CancellationToken,
    ) -> usize {
        let (tx, rx) = mpsc::channel::<WorkItem>(1);
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = JoinSet::new();

        for worker_id in 1..=self.workers {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&self.optimizer),
                events.clone(),
                cancel.clone(),
            ));
        }
        drop(events);

        let mut dispatched = 0;
        for item in work {
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = tx.send(item) => {
                    if sent.is_err() {
                        error!("All workers stopped; no further files can be dispatched");
                        break;
                    }
                    dispatched += 1;
                }
            }
        }
        drop(tx);

        if cancel.is_cancelled() {
            debug!("Dispatch stopped after {} files, waiting for running files", dispatched);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Worker task failed: {}", e);
            }
        }

        dispatched
    }
}

async fn worker_loop<T: ExternalCommand>(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    optimizer: Arc<TaskOptimizer<T>>,
    events: mpsc::UnboundedSender<AggregatorEvent>,
    cancel: CancellationToken,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(item) = next else {
            break;
        };

        if cancel.is_cancelled() {
            debug!("[worker {}] not starting {}", worker_id, item.key);
            continue;
        }

        let started = AggregatorEvent::Started {
            item: item.clone(),
            worker_id,
        };
        if events.send(started).is_err() {
            break;
        }

        let outcome = optimizer.process(&item, worker_id).await;
        if events.send(AggregatorEvent::Finished(outcome)).is_err() {
            break;
        }
    }
    debug!("[worker {}] exiting", worker_id);
}
