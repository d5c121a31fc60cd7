//! # Optimizer Module
//!
//! Modulo che separa le responsabilità del run in sottomoduli:
//! - `batch_optimizer`: Orchestratore principale
//! - `dispatcher`: Worker pool con cancellazione cooperativa
//! - `task_optimizer`: Worker per singoli file
//! - `aggregator`: Unico punto di mutazione di risultati e stato

pub mod aggregator;
pub mod batch_optimizer;
pub mod dispatcher;
pub mod task_optimizer;

pub use aggregator::{Aggregator, AggregatorEvent};
pub use batch_optimizer::BatchOptimizer;
pub use dispatcher::WorkerPool;
pub use task_optimizer::{TaskOptimizer, TaskOutcome, TaskStatus};
