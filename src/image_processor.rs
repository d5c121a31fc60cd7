//! # Image Processing Module
//!
//! Questo modulo invoca l'ottimizzatore PNG esterno su un singolo file.
//!
//! ## Architettura Zero-Dependency
//!
//! Nessuna elaborazione in memoria: l'ottimizzazione byte per byte è delegata a
//! `optipng` (o al wrapper `optipngp` che preserva i timestamp). Il modulo si
//! limita a costruire la riga di comando, avviare il processo e raccoglierne
//! exit code, stdout, stderr e durata.
//!
//! ## Riga di comando
//!
//! ```text
//! <optimizer> -strip all -preserve -o<livello> [flag extra...] <file>
//! ```
//!
//! Il file target è sempre l'ultimo argomento. L'output del tool viene decodificato
//! come UTF-8 sostituendo i byte non validi.
//!
//! ## Seam per i test
//!
//! Il dispatcher lavora su qualsiasi `ExternalCommand`, così i test possono
//! sostituire il processo esterno con un'implementazione in-process.

use crate::config::Config;
use crate::error::OptimizeError;
use crate::platform::PlatformCommands;
use crate::utils::{render_command_line, to_string_vec};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Captured result of one external command invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Raw diagnostic text for failure reports (stderr, else stdout)
    pub fn diagnostic(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        let status = match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        if text.is_empty() {
            status
        } else {
            format!("{}: {}", status, text)
        }
    }
}

/// An external program run once per file
pub trait ExternalCommand: Send + Sync + 'static {
    /// The command line as it would be typed to reproduce a run on `target`
    fn command_line(&self, target: &Path) -> String;

    /// Run the command against `target` and capture its outcome.
    ///
    /// A missing executable must be reported as [`OptimizeError::MissingTool`].
    fn run(&self, target: &Path) -> impl Future<Output = Result<ToolOutput, OptimizeError>> + Send;
}

/// Runs optipng (or a compatible wrapper) on single PNG files
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    program: PathBuf,
    args: Vec<String>,
}

impl ImageProcessor {
    /// Creates a processor from the configuration, resolving the program path
    pub fn new(config: &Config) -> Self {
        let program =
            PlatformCommands::instance().resolve_optimizer(config.optimizer_path.as_deref());

        let mut args = to_string_vec(["-strip", "all", "-preserve"]);
        args.push(format!("-o{}", config.optimization_level));
        args.extend(config.extra_flags.iter().cloned());

        Self { program, args }
    }

    /// Creates a processor running `program` with `args` before the target
    pub fn with_command(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Checks whether the configured program can be found
    pub fn is_available(&self) -> bool {
        PlatformCommands::instance().is_command_available(&self.program)
    }
}

impl ExternalCommand for ImageProcessor {
    fn command_line(&self, target: &Path) -> String {
        render_command_line(&self.program, &self.args, target)
    }

    async fn run(&self, target: &Path) -> Result<ToolOutput, OptimizeError> {
        debug!("Command: {}", self.command_line(target));

        let start_time = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(target)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OptimizeError::MissingTool(format!(
                    "{} ({})",
                    self.program.display(),
                    e
                )),
                _ => OptimizeError::Io(e),
            })?;
        let elapsed = start_time.elapsed();

        debug!(
            "{} finished with {} in {:?}",
            self.program.display(),
            output.status,
            elapsed
        );

        Ok(ToolOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed,
        })
    }
}
