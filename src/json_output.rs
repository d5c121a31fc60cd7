//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per integrazione con altri processi.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout quando `json_output` è attivo
//! - Riutilizza `RunResult` e `FailureRecord` per il riepilogo finale
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio run (radice, file scoperti, pianificati, configurazione)
//! - `file_complete`: Fine elaborazione di un file (successo o errore)
//! - `complete`: Fine run con il `RunResult` completo
//! - `error`: Errore fatale prima dell'avvio dei worker

use crate::config::Config;
use crate::path_key::PathKey;
use crate::progress::RunResult;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del run
    #[serde(rename = "start")]
    Start {
        root: PathBuf,
        discovered: usize,
        planned: usize,
        config: JsonConfig,
    },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_complete")]
    FileComplete {
        key: PathKey,
        worker_id: usize,
        original_size: u64,
        optimized_size: Option<u64>,
        error: Option<String>,
    },

    /// Fine del run
    #[serde(rename = "complete")]
    Complete { result: RunResult },

    /// Errore fatale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione semplificata per JSON
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub workers: usize,
    pub recursive: bool,
    pub optimization_level: u8,
    pub extra_flags: Vec<String>,
    pub dry_run: bool,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(root: PathBuf, discovered: usize, planned: usize, config: &Config) -> Self {
        Self::Start {
            root,
            discovered,
            planned,
            config: JsonConfig::from(config),
        }
    }

    pub fn file_complete(
        key: PathKey,
        worker_id: usize,
        original_size: u64,
        optimized_size: Option<u64>,
        error: Option<String>,
    ) -> Self {
        Self::FileComplete {
            key,
            worker_id,
            original_size,
            optimized_size,
            error,
        }
    }

    pub fn complete(result: &RunResult) -> Self {
        Self::Complete {
            result: result.clone(),
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.workers,
            recursive: config.recursive,
            optimization_level: config.optimization_level,
            extra_flags: config.extra_flags.clone(),
            dry_run: config.dry_run,
        }
    }
}
