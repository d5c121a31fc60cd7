//! # PNG Batch Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `path_key`: Chiavi normalizzate relative alla radice
//! - `state`: Fingerprint dei file già ottimizzati e persistenza stato
//! - `file_manager`: Discovery dei file e utilità sui file
//! - `planner`: Confronto tra file scoperti e stato persistito
//! - `safe_name`: Rinomina reversibile per nomi non indirizzabili dal tool
//! - `image_processor`: Invocazione del tool esterno (optipng)
//! - `optimizer`: Orchestratore, worker pool e aggregator
//! - `progress`: Progress bar e risultato del run
//! - `signal`: Ctrl+C e cancellazione cooperativa
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use png_batch_optimizer::{BatchOptimizer, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! let optimizer = BatchOptimizer::new(&path, Config::default())?;
//! let result = optimizer.run(CancellationToken::new()).await?;
//! println!("{}", result.format_summary());
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod path_key;
pub mod planner;
pub mod platform;
pub mod progress;
pub mod safe_name;
pub mod signal;
pub mod state;
pub mod tool_resolver;
pub mod utils;

pub use config::Config;
pub use error::OptimizeError;
pub use image_processor::{ExternalCommand, ImageProcessor, ToolOutput};
pub use optimizer::BatchOptimizer;
pub use path_key::PathKey;
pub use progress::{FailureRecord, ItemState, RunResult};
pub use state::{Fingerprint, FingerprintStore};
