//! Shared fixtures for the run-level tests.

#![allow(dead_code)]

use png_batch_optimizer::{
    BatchOptimizer, Config, ExternalCommand, FingerprintStore, OptimizeError, RunResult,
    ToolOutput,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Content prefix that makes the fake optimizer fail on a file
pub const BAD_CONTENT: &[u8] = b"BAD";

#[derive(Debug, Default)]
pub struct ToolStats {
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
    pub targets: Mutex<Vec<PathBuf>>,
}

impl ToolStats {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<PathBuf> {
        self.targets.lock().unwrap().clone()
    }
}

/// In-process stand-in for optipng.
///
/// Halves the file on success; fails files whose content starts with
/// [`BAD_CONTENT`].
#[derive(Clone, Default)]
pub struct FakeTool {
    stats: Arc<ToolStats>,
    delay: Duration,
    cancel_on_call: Option<(usize, CancellationToken)>,
    missing: bool,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cancel `token` when the n-th invocation starts (1-based)
    pub fn cancel_on_call(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((call, token));
        self
    }

    /// Behave like an executable that is not installed
    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    pub fn stats(&self) -> Arc<ToolStats> {
        Arc::clone(&self.stats)
    }
}

impl ExternalCommand for FakeTool {
    fn command_line(&self, target: &Path) -> String {
        format!("fake-optipng -o5 {}", target.display())
    }

    async fn run(&self, target: &Path) -> Result<ToolOutput, OptimizeError> {
        let call = self.stats.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.targets.lock().unwrap().push(target.to_path_buf());

        if self.missing {
            return Err(OptimizeError::MissingTool("fake-optipng".to_string()));
        }
        if let Some((n, token)) = &self.cancel_on_call {
            if call == *n {
                token.cancel();
            }
        }

        let now = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let outcome = shrink(target).await;
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

async fn shrink(target: &Path) -> Result<ToolOutput, OptimizeError> {
    let content = tokio::fs::read(target).await?;
    if content.starts_with(BAD_CONTENT) {
        return Ok(ToolOutput {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: format!("{}: Not a PNG file", target.display()),
            elapsed: Duration::from_millis(1),
        });
    }

    tokio::fs::write(target, &content[..content.len() / 2]).await?;
    Ok(ToolOutput {
        success: true,
        exit_code: Some(0),
        stdout: "Output IDAT size = 42 bytes".to_string(),
        stderr: String::new(),
        elapsed: Duration::from_millis(1),
    })
}

/// Create `relative` under `root` with `size` bytes of PNG-ish content
pub fn write_file(root: &Path, relative: &str, size: usize) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut content = b"\x89PNG".to_vec();
    content.resize(size.max(4), 0);
    std::fs::write(&path, content).unwrap();
    path
}

pub fn write_bad_file(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::write(&path, [BAD_CONTENT, b" not an image"].concat()).unwrap();
    path
}

pub fn config(workers: usize) -> Config {
    Config {
        workers,
        ..Default::default()
    }
}

pub async fn run_with(root: &Path, config: Config, tool: FakeTool) -> RunResult {
    run_cancellable(root, config, tool, CancellationToken::new()).await
}

pub async fn run_cancellable(
    root: &Path,
    config: Config,
    tool: FakeTool,
    cancel: CancellationToken,
) -> RunResult {
    BatchOptimizer::with_tool(root, config, tool)
        .unwrap()
        .run(cancel)
        .await
        .unwrap()
}

pub async fn load_store(root: &Path) -> FingerprintStore {
    FingerprintStore::load(&Config::default().state_file_path(root)).await
}

pub fn store_keys(store: &FingerprintStore) -> Vec<String> {
    store.keys().map(|key| key.as_str().to_string()).collect()
}

/// Names in `dir` that look like leftover surrogates
pub fn surrogates_in(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with(".pngopt-"))
        .collect()
}
