//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri dell'esecuzione batch
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `workers`: Numero di worker paralleli (default: 8)
//! - `recursive`: Scansione ricorsiva delle sottodirectory (default: false)
//! - `optimizer_path`: Path dell'ottimizzatore esterno (default: dipende dalla piattaforma)
//! - `optimization_level`: Livello `-oN` passato a optipng (0-7, default: 5)
//! - `extension`: Estensione dei file da processare (default: "png")
//! - `include_patterns`: Filtri glob sul nome file (case-insensitive)
//! - `extra_flags`: Flag aggiuntivi passati così come sono al tool esterno
//! - `state_file_name`: Nome del file di stato nascosto nella radice
//! - `flush_interval`: Successi tra un salvataggio incrementale e l'altro (0 = solo a fine run)
//! - `max_path_len`: Override della soglia di lunghezza path
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     workers: 4,
//!     recursive: true,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::OptimizeError;
use crate::platform::PlatformCommands;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Nome del file di stato creato nella directory scansionata
pub const DEFAULT_STATE_FILE_NAME: &str = ".optimized_png_timestamps.json";

/// Configuration for a batch optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of parallel workers
    pub workers: usize,
    /// Walk subdirectories
    pub recursive: bool,
    /// External optimizer executable (None = platform default)
    pub optimizer_path: Option<PathBuf>,
    /// optipng optimization level (0-7)
    pub optimization_level: u8,
    /// Target extension, matched case-insensitively
    pub extension: String,
    /// Glob filters on the file name (empty = every file with the extension)
    pub include_patterns: Vec<String>,
    /// Extra flags passed through to the external tool
    pub extra_flags: Vec<String>,
    /// Hidden state file stored inside the scanned root
    pub state_file_name: String,
    /// Successful files between incremental state flushes (0 = end of run only)
    pub flush_interval: usize,
    /// Path length above which a surrogate name is used (None = platform threshold)
    pub max_path_len: Option<usize>,
    /// Dry run - list the work without invoking the optimizer
    pub dry_run: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 8,
            recursive: false,
            optimizer_path: None,
            optimization_level: 5,
            extension: "png".to_string(),
            include_patterns: Vec::new(),
            extra_flags: Vec::new(),
            state_file_name: DEFAULT_STATE_FILE_NAME.to_string(),
            flush_interval: 25,
            max_path_len: None,
            dry_run: false,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), OptimizeError> {
        if self.workers == 0 {
            return Err(invalid("Number of workers must be greater than 0"));
        }

        if self.optimization_level > 7 {
            return Err(invalid("Optimization level must be between 0 and 7"));
        }

        let extension = self.extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(invalid(format!("Invalid target extension: '{}'", self.extension)));
        }

        for pattern in &self.include_patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| invalid(format!("Invalid glob pattern '{}': {}", pattern, e)))?;
        }

        if !self.state_file_name.starts_with('.')
            || self.state_file_name.len() < 2
            || self.state_file_name.contains(['/', '\\'])
        {
            return Err(invalid(format!(
                "State file name must be a hidden file name (e.g. '{}'), got '{}'",
                DEFAULT_STATE_FILE_NAME, self.state_file_name
            )));
        }

        if self.max_path_len == Some(0) {
            return Err(invalid("Maximum path length must be greater than 0"));
        }

        Ok(())
    }

    /// Estensione normalizzata (senza punto iniziale, minuscola)
    pub fn normalized_extension(&self) -> String {
        self.extension.trim_start_matches('.').to_ascii_lowercase()
    }

    /// Soglia effettiva per l'uso del nome surrogato
    pub fn path_limit(&self) -> usize {
        self.max_path_len
            .unwrap_or_else(|| PlatformCommands::instance().path_limit())
    }

    /// Path del file di stato per una directory radice
    pub fn state_file_path(&self, root: &Path) -> PathBuf {
        root.join(&self.state_file_name)
    }

    /// Default location of the optional user config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("png-optimizer").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> OptimizeError {
    OptimizeError::Configuration(message.into())
}
