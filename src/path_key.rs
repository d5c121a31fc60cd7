//! Stable cache keys for files under a scan root.
//!
//! A key is the path relative to the root, joined with `/` and normalized to
//! Unicode NFC. macOS hands out decomposed (NFD) names while Linux and Windows
//! usually keep composed (NFC) ones, so `café.png` must produce the same key
//! whichever form the filesystem returned. Keys never depend on where the root
//! lives, so a state file survives moving the whole directory.

use crate::error::OptimizeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use unicode_normalization::UnicodeNormalization;

/// Root-relative, `/`-separated, NFC-normalized file key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathKey(String);

impl PathKey {
    /// Compute the key of `path` relative to `root`.
    ///
    /// Pure: the filesystem is never consulted, so `path` and `root` must be
    /// spelled the same way (both canonical, or both as produced by the walk).
    pub fn from_path(path: &Path, root: &Path) -> Result<Self, OptimizeError> {
        let relative = path.strip_prefix(root).map_err(|_| OptimizeError::InvalidPath {
            path: path.to_path_buf(),
            message: format!("not inside scan root {}", root.display()),
        })?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy()),
                Component::CurDir => {}
                other => {
                    return Err(OptimizeError::InvalidPath {
                        path: path.to_path_buf(),
                        message: format!("unexpected component {:?}", other.as_os_str()),
                    })
                }
            }
        }

        if parts.is_empty() {
            return Err(OptimizeError::InvalidPath {
                path: path.to_path_buf(),
                message: "path is the scan root itself".to_string(),
            });
        }

        Ok(Self::from_raw(&parts.join("/")))
    }

    /// Build a key from an already relative string (e.g. read back from the state file).
    pub fn from_raw(raw: &str) -> Self {
        let separated = if cfg!(windows) {
            raw.replace('\\', "/")
        } else {
            raw.to_string()
        };
        Self(separated.nfc().collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
