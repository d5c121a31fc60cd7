//! Reversible renames for files the external optimizer cannot address.
//!
//! Names with non-ASCII characters and paths longer than the platform limit are
//! renamed to a surrogate (`.pngopt-<hash>.<ext>`) in the same directory before
//! the optimizer runs, and renamed back afterwards whatever the outcome. The
//! hash covers the full absolute path, so two workers handling two different
//! files never pick the same surrogate.

use crate::error::OptimizeError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix of every surrogate file name
pub const SURROGATE_PREFIX: &str = ".pngopt-";

const HASH_LEN: usize = 16;

/// Whether `path` must go through a surrogate name
pub fn needs_surrogate(path: &Path, path_limit: usize) -> bool {
    let name_is_ascii = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::is_ascii)
        .unwrap_or(false);

    !name_is_ascii || path.as_os_str().len() > path_limit
}

/// Deterministic surrogate for `path`, in the same directory
pub fn surrogate_path(path: &Path) -> PathBuf {
    let digest = Sha256::digest(path.as_os_str().as_encoded_bytes());
    let hash = &hex::encode(digest)[..HASH_LEN];

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.is_ascii() && !ext.is_empty())
        .map(str::to_ascii_lowercase);

    let name = match extension {
        Some(ext) => format!("{}{}.{}", SURROGATE_PREFIX, hash, ext),
        None => format!("{}{}", SURROGATE_PREFIX, hash),
    };
    path.with_file_name(name)
}

/// Check whether a file name has the shape of a surrogate
pub fn is_surrogate_name(file_name: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(SURROGATE_PREFIX) else {
        return false;
    };
    let (Some(hash), Some(tail)) = (rest.get(..HASH_LEN), rest.get(HASH_LEN..)) else {
        return false;
    };
    hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && (tail.is_empty() || tail.starts_with('.'))
}

/// A file checked out under the name the optimizer should be given.
///
/// Created by [`SafeName::acquire`]; must be handed back with
/// [`SafeName::restore`] once the optimizer has returned.
#[derive(Debug)]
#[must_use = "a renamed file must be restored"]
pub struct SafeName {
    original: PathBuf,
    surrogate: Option<PathBuf>,
}

impl SafeName {
    /// Rename `original` to its surrogate when needed.
    ///
    /// Fails without touching anything if the surrogate name is already taken,
    /// or if the surrogate itself would still exceed `path_limit` (a short name
    /// inside a deep directory gets no shorter by renaming).
    pub async fn acquire(original: &Path, path_limit: usize) -> Result<Self, OptimizeError> {
        if !needs_surrogate(original, path_limit) {
            return Ok(Self {
                original: original.to_path_buf(),
                surrogate: None,
            });
        }

        let surrogate = surrogate_path(original);
        if surrogate.as_os_str().len() > path_limit {
            return Err(OptimizeError::Rename {
                from: original.to_path_buf(),
                to: surrogate,
                reason: "path too long even under a surrogate name".to_string(),
            });
        }
        if tokio::fs::try_exists(&surrogate).await.unwrap_or(true) {
            return Err(OptimizeError::Rename {
                from: original.to_path_buf(),
                to: surrogate,
                reason: "surrogate name is already in use".to_string(),
            });
        }

        tokio::fs::rename(original, &surrogate)
            .await
            .map_err(|e| OptimizeError::Rename {
                from: original.to_path_buf(),
                to: surrogate.clone(),
                reason: e.to_string(),
            })?;

        debug!("Renamed {} -> {}", original.display(), surrogate.display());
        Ok(Self {
            original: original.to_path_buf(),
            surrogate: Some(surrogate),
        })
    }

    /// Path to hand to the external optimizer
    pub fn target(&self) -> &Path {
        self.surrogate.as_deref().unwrap_or(&self.original)
    }

    pub fn surrogate(&self) -> Option<&Path> {
        self.surrogate.as_deref()
    }

    /// Put the file back under its original name.
    ///
    /// Never overwrites: if the original path is occupied the file stays under
    /// the surrogate and an error is returned.
    pub async fn restore(self) -> Result<(), OptimizeError> {
        let Some(surrogate) = self.surrogate else {
            return Ok(());
        };

        let rename_error = |reason: String| OptimizeError::Rename {
            from: surrogate.clone(),
            to: self.original.clone(),
            reason,
        };

        if !tokio::fs::try_exists(&surrogate).await.unwrap_or(false) {
            return Err(rename_error("surrogate no longer exists".to_string()));
        }

        if tokio::fs::try_exists(&self.original).await.unwrap_or(true) {
            warn!(
                "{} is occupied; leaving the optimized file at {}",
                self.original.display(),
                surrogate.display()
            );
            return Err(rename_error(
                "original path is occupied, file left under surrogate name".to_string(),
            ));
        }

        tokio::fs::rename(&surrogate, &self.original)
            .await
            .map_err(|e| rename_error(e.to_string()))?;

        debug!("Restored {} -> {}", surrogate.display(), self.original.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_needs_surrogate() {
        assert!(!needs_surrogate(Path::new("/photos/a.png"), 4096));
        assert!(needs_surrogate(Path::new("/photos/résumé.png"), 4096));
        assert!(needs_surrogate(Path::new("/photos/a.png"), 10));
    }

    #[test]
    fn test_surrogate_is_deterministic_and_path_specific() {
        let a = surrogate_path(Path::new("/one/résumé.png"));
        let b = surrogate_path(Path::new("/two/résumé.png"));
        assert_eq!(a, surrogate_path(Path::new("/one/résumé.png")));
        assert_ne!(a.file_name(), b.file_name());
        assert_eq!(a.parent(), Some(Path::new("/one")));

        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.is_ascii());
        assert!(name.ends_with(".png"));
        assert!(is_surrogate_name(name));
    }

    #[test]
    fn test_surrogate_drops_non_ascii_extension() {
        let path = surrogate_path(Path::new("/x/file.pñg"));
        assert!(path.extension().is_none());
    }

    #[test]
    fn test_is_surrogate_name() {
        assert!(is_surrogate_name(".pngopt-0123456789abcdef.png"));
        assert!(is_surrogate_name(".pngopt-0123456789abcdef"));
        assert!(!is_surrogate_name(".pngopt-0123.png"));
        assert!(!is_surrogate_name(".pngopt-0123456789ABCDEF.png"));
        assert!(!is_surrogate_name(".pngopt-0123456789abcdefX.png"));
        assert!(!is_surrogate_name("a.png"));
    }

    #[tokio::test]
    async fn test_acquire_and_restore_round_trip() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("résumé.png");
        tokio::fs::write(&original, b"data").await.unwrap();

        let safe = SafeName::acquire(&original, 4096).await.unwrap();
        let target = safe.target().to_path_buf();
        assert_ne!(target, original);
        assert!(target.exists());
        assert!(!original.exists());

        safe.restore().await.unwrap();
        assert!(original.exists());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_safe_names_are_left_alone() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("plain.png");
        tokio::fs::write(&original, b"data").await.unwrap();

        let safe = SafeName::acquire(&original, 4096).await.unwrap();
        assert_eq!(safe.target(), original.as_path());
        assert!(safe.surrogate().is_none());
        safe.restore().await.unwrap();
        assert!(original.exists());
    }

    #[tokio::test]
    async fn test_occupied_surrogate_aborts_without_renaming() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("ünïcode.png");
        tokio::fs::write(&original, b"data").await.unwrap();
        tokio::fs::write(surrogate_path(&original), b"other").await.unwrap();

        let err = SafeName::acquire(&original, 4096).await.unwrap_err();
        assert!(matches!(err, OptimizeError::Rename { .. }));
        assert!(original.exists());
    }

    #[tokio::test]
    async fn test_occupied_original_leaves_surrogate_in_place() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("ñame.png");
        tokio::fs::write(&original, b"data").await.unwrap();

        let safe = SafeName::acquire(&original, 4096).await.unwrap();
        let surrogate = safe.target().to_path_buf();
        tokio::fs::write(&original, b"intruder").await.unwrap();

        assert!(safe.restore().await.is_err());
        assert!(surrogate.exists());
        assert_eq!(tokio::fs::read(&original).await.unwrap(), b"intruder");
    }

    #[tokio::test]
    async fn test_long_name_is_shortened_under_limit() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join(format!("{}.png", "x".repeat(80)));
        tokio::fs::write(&original, b"data").await.unwrap();
        let limit = original.as_os_str().len() - 1;

        let safe = SafeName::acquire(&original, limit).await.unwrap();
        assert!(safe.target().as_os_str().len() <= limit);
        safe.restore().await.unwrap();
        assert!(original.exists());
    }

    #[tokio::test]
    async fn test_short_name_in_deep_directory_is_refused() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("d".repeat(200));
        tokio::fs::create_dir(&deep).await.unwrap();
        let original = deep.join("a.png");
        tokio::fs::write(&original, b"data").await.unwrap();
        let limit = original.as_os_str().len() - 1;

        let err = SafeName::acquire(&original, limit).await.unwrap_err();
        match err {
            OptimizeError::Rename { reason, .. } => assert!(reason.contains("too long")),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(original.exists());
        assert_eq!(std::fs::read_dir(&deep).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_vanished_surrogate_is_reported() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("ñame.png");
        tokio::fs::write(&original, b"data").await.unwrap();

        let safe = SafeName::acquire(&original, 4096).await.unwrap();
        tokio::fs::remove_file(safe.target()).await.unwrap();
        assert!(safe.restore().await.is_err());
    }
}
