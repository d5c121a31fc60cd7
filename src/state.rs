//! # State Management Module
//!
//! Questo modulo gestisce il tracking dei file già ottimizzati per evitare rielaborazioni.
//!
//! ## Responsabilità:
//! - Mantiene la mappa `PathKey -> Fingerprint` (mtime dell'ultimo successo)
//! - Carica lo stato una volta per run, tollerando file mancanti o corrotti
//! - Elimina le entry di file che non esistono più (`reconcile`)
//! - Persiste lo stato con scrittura su file temporaneo + rename atomico
//!
//! ## Strategia di persistence:
//! - Un file JSON nascosto nella radice scansionata (`.optimized_png_timestamps.json`)
//! - Chiavi relative alla radice: lo stato resta valido se la directory viene spostata
//! - Tracking basato solo su modification time (nessun hash del contenuto): un file
//!   riscritto mantenendo lo stesso mtime viene considerato invariato
//! - Nessun lock tra processi: due run concorrenti sulla stessa radice non sono supportati
//!
//! ## Esempio struttura state file:
//! ```json
//! {
//!   "icons/a.png": 1700000000123456789,
//!   "résumé.png": 1700000000987654321
//! }
//! ```

use crate::error::OptimizeError;
use crate::path_key::PathKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Modification time in nanoseconds since the UNIX epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(i64);

impl Fingerprint {
    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_nanos())
                .map(|n| -n)
                .unwrap_or(i64::MIN),
        };
        Self(nanos)
    }

    pub fn from_metadata(metadata: &std::fs::Metadata) -> std::io::Result<Self> {
        Ok(Self::from_system_time(metadata.modified()?))
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }
}

impl From<i64> for Fingerprint {
    fn from(nanos: i64) -> Self {
        Self(nanos)
    }
}

/// In-memory view of the state file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FingerprintStore {
    entries: BTreeMap<PathKey, Fingerprint>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store; a missing file is an empty store, a corrupt one is
    /// logged and discarded.
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!("Could not read state file {}: {}. Starting fresh.", path.display(), e);
                return Self::new();
            }
        };

        match Self::from_json(&content) {
            Ok(store) => {
                debug!("Loaded {} entries from {}", store.len(), path.display());
                store
            }
            Err(e) => {
                warn!("Corrupted state file {}: {}. Starting fresh.", path.display(), e);
                Self::new()
            }
        }
    }

    /// Drop entries whose key was not discovered in this run.
    pub fn reconcile(mut self, live_keys: &HashSet<PathKey>) -> (Self, usize) {
        let before = self.entries.len();
        self.entries.retain(|key, _| live_keys.contains(key));
        let removed = before - self.entries.len();
        (self, removed)
    }

    /// Serialize the whole mapping and replace the state file.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the target, so a failed write leaves the previous
    /// state file intact.
    pub async fn save(&self, path: &Path) -> Result<(), OptimizeError> {
        let content = self.to_json()?;
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_atomically(&target, content.as_bytes())).await??;
        debug!("Saved {} entries to {}", self.len(), path.display());
        Ok(())
    }

    pub fn get(&self, key: &PathKey) -> Option<Fingerprint> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: PathKey, fingerprint: Fingerprint) -> Option<Fingerprint> {
        self.entries.insert(key, fingerprint)
    }

    /// Check if a file is recorded with exactly this fingerprint
    pub fn is_current(&self, key: &PathKey, fingerprint: Fingerprint) -> bool {
        self.get(key) == Some(fingerprint)
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PathKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_json(&self) -> Result<String, OptimizeError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    fn from_json(content: &str) -> Result<Self, OptimizeError> {
        let raw: BTreeMap<String, Fingerprint> = serde_json::from_str(content)?;
        let entries = raw
            .into_iter()
            .map(|(key, fingerprint)| (PathKey::from_raw(&key), fingerprint))
            .collect();
        Ok(Self { entries })
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), OptimizeError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let persist_error = |e: std::io::Error| {
        OptimizeError::Persistence(format!("failed to write {}: {}", path.display(), e))
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".optimized_state")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(persist_error)?;
    tmp.write_all(bytes).map_err(persist_error)?;
    tmp.as_file().sync_all().map_err(persist_error)?;
    tmp.persist(path).map_err(|e| persist_error(e.error))?;
    Ok(())
}
