//! # PNG Batch Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Costruzione della configurazione (file opzionale + override da CLI)
//! - Collegamento di Ctrl+C al token di cancellazione e avvio del run
//!
//! ## Exit code:
//! - 0: run completato (anche con errori su singoli file)
//! - 1: directory o configurazione non valida
//! - 130: run interrotto con Ctrl+C
//!
//! ## Esempio di utilizzo:
//! ```bash
//! png-optimizer /path/to/images -R -t 4 -o 7 -- -fix
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use png_batch_optimizer::{
    json_output::JsonMessage,
    signal::{install_ctrl_c_handler, EXIT_CODE_INTERRUPTED},
    platform::PlatformCommands,
    BatchOptimizer, Config,
};

#[derive(Parser)]
#[command(name = "png-optimizer")]
#[command(about = "Losslessly optimize PNG files in a directory, skipping files already done")]
struct Args {
    /// Directory containing PNG files to optimize
    directory: PathBuf,

    /// Number of parallel optipng processes [default: 8]
    #[arg(short = 't', long = "threads")]
    threads: Option<usize>,

    /// optipng optimization level [default: 5]
    #[arg(short = 'o', long, value_parser = clap::value_parser!(u8).range(0..=7))]
    optimization_level: Option<u8>,

    /// Path to the optipng executable (default: optipngp, optipng on Windows)
    #[arg(long)]
    optipng_path: Option<PathBuf>,

    /// Process subdirectories too
    #[arg(short = 'R', long)]
    recursive: bool,

    /// Only process files whose name matches this glob (repeatable)
    #[arg(long = "include")]
    include: Vec<String>,

    /// State file name inside the directory
    #[arg(long)]
    state_file: Option<String>,

    /// Save state every N optimized files (0 = only at the end)
    #[arg(long)]
    flush_interval: Option<usize>,

    /// Path length above which files are renamed before optimizing
    #[arg(long)]
    max_path_len: Option<usize>,

    /// Dry run - list the files that would be optimized
    #[arg(long)]
    dry_run: bool,

    /// Output progress and status as JSON for programmatic use
    #[arg(long)]
    json: bool,

    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Extra flags passed to optipng unchanged (after `--`)
    #[arg(last = true)]
    extra_flags: Vec<String>,
}

impl Args {
    /// Applica gli override da CLI sopra la configurazione caricata
    fn apply(self, mut config: Config) -> (PathBuf, Config) {
        if let Some(threads) = self.threads {
            config.workers = threads;
        }
        if let Some(level) = self.optimization_level {
            config.optimization_level = level;
        }
        if self.optipng_path.is_some() {
            config.optimizer_path = self.optipng_path;
        }
        if self.recursive {
            config.recursive = true;
        }
        if !self.include.is_empty() {
            config.include_patterns = self.include;
        }
        if let Some(state_file) = self.state_file {
            config.state_file_name = state_file;
        }
        if let Some(interval) = self.flush_interval {
            config.flush_interval = interval;
        }
        if self.max_path_len.is_some() {
            config.max_path_len = self.max_path_len;
        }
        if !self.extra_flags.is_empty() {
            config.extra_flags = self.extra_flags;
        }
        config.dry_run |= self.dry_run;
        config.json_output |= self.json;
        (self.directory, config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging; stdout stays clean for JSON output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match args.config.clone().or_else(Config::default_path) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(&path).await?
        }
        Some(path) if args.config.is_some() => {
            return Err(anyhow::anyhow!("Config file does not exist: {}", path.display()));
        }
        _ => Config::default(),
    };
    let (directory, config) = args.apply(config);
    debug!("Platform: {}", PlatformCommands::system_info());
    let json_output = config.json_output;

    let optimizer = match BatchOptimizer::new(&directory, config) {
        Ok(optimizer) => optimizer,
        Err(e) => {
            report_fatal(&e.to_string(), json_output);
            return Ok(ExitCode::FAILURE);
        }
    };

    let cancel = CancellationToken::new();
    let ctrl_c = install_ctrl_c_handler(cancel.clone());
    let outcome = optimizer.run(cancel).await;
    ctrl_c.abort();

    match outcome {
        Ok(result) if result.cancelled => Ok(ExitCode::from(EXIT_CODE_INTERRUPTED)),
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            report_fatal(&e.to_string(), json_output);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report_fatal(message: &str, json_output: bool) {
    if json_output {
        JsonMessage::error(message.to_string(), None).emit();
    } else {
        error!("{}", message);
    }
}
