//! Change planning: which discovered files need the optimizer this run.
//!
//! A file is planned when its key is missing from the store or its current
//! modification fingerprint differs from the stored one. Everything else is
//! counted as skipped. The work list keeps discovery order, which is sorted per
//! directory, so the same snapshot always yields the same plan.

use crate::error::OptimizeError;
use crate::path_key::PathKey;
use crate::state::{Fingerprint, FingerprintStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One file queued for a single optimizer invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,
    pub key: PathKey,
}

/// Outcome of planning
#[derive(Debug, Default)]
pub struct Plan {
    pub work: Vec<WorkItem>,
    /// Files unchanged since their last successful run
    pub skipped: usize,
    /// Keys of every discovered file, for pruning the store
    pub live_keys: HashSet<PathKey>,
    /// Files that disappeared or could not be read between discovery and planning
    pub unreadable: usize,
}

impl Plan {
    /// Diff the discovered files against the store
    pub fn build(
        root: &Path,
        files: &[PathBuf],
        store: &FingerprintStore,
    ) -> Result<Self, OptimizeError> {
        let mut plan = Plan::default();

        for path in files {
            let key = PathKey::from_path(path, root)?;
            if !plan.live_keys.insert(key.clone()) {
                warn!(
                    "{} maps to the same key as another file ({}); skipping it",
                    path.display(),
                    key
                );
                continue;
            }

            let metadata = std::fs::metadata(path).and_then(|m| Fingerprint::from_metadata(&m));
            let fingerprint = match metadata {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    warn!("Cannot read {}: {}; skipping", path.display(), e);
                    plan.unreadable += 1;
                    continue;
                }
            };

            if store.is_current(&key, fingerprint) {
                plan.skipped += 1;
            } else {
                let reason = if store.contains(&key) { "modified" } else { "new" };
                debug!("Planned {} ({})", key, reason);
                plan.work.push(WorkItem {
                    path: path.clone(),
                    key,
                });
            }
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"png").unwrap();
        path
    }

    fn fingerprint_of(path: &Path) -> Fingerprint {
        Fingerprint::from_metadata(&std::fs::metadata(path).unwrap()).unwrap()
    }

    #[test]
    fn test_new_and_modified_files_are_planned() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let fresh = write(root, "a.png");
        let unchanged = write(root, "b.png");
        let modified = write(root, "c.png");

        let mut store = FingerprintStore::new();
        store.insert(PathKey::from_raw("b.png"), fingerprint_of(&unchanged));
        store.insert(PathKey::from_raw("c.png"), fingerprint_of(&modified));
        filetime::set_file_mtime(&modified, FileTime::from_unix_time(1_000_000, 0)).unwrap();

        let files = vec![fresh.clone(), unchanged, modified.clone()];
        let plan = Plan::build(root, &files, &store).unwrap();

        let planned: Vec<_> = plan.work.iter().map(|item| item.path.clone()).collect();
        assert_eq!(planned, vec![fresh, modified]);
        assert_eq!(plan.skipped, 1);
        assert_eq!(plan.live_keys.len(), 3);
    }

    #[test]
    fn test_vanished_file_is_not_planned() {
        let dir = TempDir::new().unwrap();
        let files = vec![dir.path().join("ghost.png")];
        let plan = Plan::build(dir.path(), &files, &FingerprintStore::new()).unwrap();
        assert!(plan.work.is_empty());
        assert_eq!(plan.unreadable, 1);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let files: Vec<_> = ["x.png", "y.png", "z.png"]
            .iter()
            .map(|name| write(dir.path(), name))
            .collect();
        let store = FingerprintStore::new();
        let first = Plan::build(dir.path(), &files, &store).unwrap();
        let second = Plan::build(dir.path(), &files, &store).unwrap();
        assert_eq!(first.work, second.work);
    }
}
