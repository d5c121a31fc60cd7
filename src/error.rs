//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori fatali (configurazione) da errori per singolo file
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Configuration`: Directory radice mancante o parametri non validi (fatale, prima di ogni lavoro)
//! - `Discovery`: Sottodirectory non accessibile (saltata con warning)
//! - `InvalidPath`: Path fuori dalla radice durante il calcolo della chiave
//! - `Rename`: Rinomina verso/da nome surrogato fallita (fallisce solo quel file)
//! - `ExternalTool`: Exit code non zero del tool esterno (fallisce solo quel file)
//! - `MissingTool`: Binario esterno non trovato (interrompe il dispatch al primo caso)
//! - `Persistence`: Lettura/scrittura del file di stato (loggato, non fatale)
//!
//! ## Esempio:
//! ```rust,ignore
//! if !root.is_dir() {
//!     return Err(OptimizeError::Configuration(format!("Directory '{}' not found", root.display())));
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for batch optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot read {path}: {message}")]
    Discovery { path: PathBuf, message: String },

    #[error("Invalid path {path}: {message}")]
    InvalidPath { path: PathBuf, message: String },

    #[error("Rename {from} -> {to} failed: {reason}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("External tool failed: {diagnostic}")]
    ExternalTool { diagnostic: String },

    #[error("Dependency missing: {0}")]
    MissingTool(String),

    #[error("State file error: {0}")]
    Persistence(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl OptimizeError {
    /// Errore che si ripeterebbe per ogni file (binario esterno assente)
    pub fn is_missing_tool(&self) -> bool {
        matches!(self, Self::MissingTool(_))
    }

    /// Errore che deve interrompere l'esecuzione prima di avviare i worker
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
