//! # Platform-specific utilities
//!
//! Questo modulo centralizza le differenze tra sistemi operativi:
//! - nome di default dell'ottimizzatore esterno (`optipngp` su Linux/macOS, wrapper
//!   che preserva i timestamp; `optipng` su Windows con `-preserve`)
//! - soglia di lunghezza path oltre la quale il tool esterno non è affidabile
//! - risoluzione del binario tramite `ToolPathResolver`

use crate::tool_resolver::ToolPathResolver;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// Platform-specific command manager with tool resolution
pub struct PlatformCommands {
    default_optimizer: &'static str,
    path_limit: usize,
    tool_resolver: ToolPathResolver,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let (default_optimizer, path_limit) = if cfg!(windows) {
            ("optipng", 260)
        } else if cfg!(target_os = "macos") {
            ("optipngp", 1024)
        } else {
            ("optipngp", 4096)
        };

        Self {
            default_optimizer,
            path_limit,
            tool_resolver: ToolPathResolver::new(),
        }
    }

    /// Nome dell'ottimizzatore usato quando non configurato
    pub fn default_optimizer(&self) -> &'static str {
        self.default_optimizer
    }

    /// Lunghezza massima (in byte) di un path passato al tool esterno
    pub fn path_limit(&self) -> usize {
        self.path_limit
    }

    /// Risolve il programma da eseguire; se non trovato usa il nome così com'è
    pub fn resolve_optimizer(&self, configured: Option<&Path>) -> PathBuf {
        let requested = configured
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(self.default_optimizer));

        match self.tool_resolver.resolve_tool(&requested) {
            Some(path) => path,
            None => {
                warn!(
                    "Optimizer '{}' not found; every file will fail until it is installed",
                    requested.display()
                );
                requested
            }
        }
    }

    /// Check if a command is available on the system
    pub fn is_command_available(&self, program: &Path) -> bool {
        self.tool_resolver.is_tool_available(program)
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
