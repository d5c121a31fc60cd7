//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file da ottimizzare e le utilità sui file.
//!
//! ## Responsabilità:
//! - Enumerazione dei file candidati sotto la radice (ricorsiva o solo primo livello)
//! - Filtro per estensione (case-insensitive) e per pattern glob sul nome
//! - Esclusione del file di stato e dei nomi surrogati rimasti da run interrotti
//! - Lettura di dimensione e fingerprint di un file
//! - Formattazione human-readable delle dimensioni
//!
//! ## Gestione errori:
//! - Radice mancante o non directory: errore di configurazione (fatale)
//! - Sottodirectory o entry non accessibili: saltate con warning e conteggiate
//!
//! ## Esempio:
//! ```rust,ignore
//! let options = DiscoveryOptions::from_config(&config)?;
//! let discovery = FileManager::discover(&root, &options)?;
//! for file in discovery.files {
//!     // plan file
//! }
//! ```

use crate::config::Config;
use crate::error::OptimizeError;
use crate::safe_name;
use crate::state::Fingerprint;
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Filtri applicati durante la discovery
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub recursive: bool,
    /// Lower-case extension without the leading dot
    pub extension: String,
    pub patterns: Vec<Pattern>,
    /// File names never returned (the state file)
    pub excluded_names: Vec<String>,
}

impl DiscoveryOptions {
    pub fn from_config(config: &Config) -> Result<Self, OptimizeError> {
        let patterns = config
            .include_patterns
            .iter()
            .map(|raw| {
                Pattern::new(raw).map_err(|e| {
                    OptimizeError::Configuration(format!("Invalid glob pattern '{}': {}", raw, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            recursive: config.recursive,
            extension: config.normalized_extension(),
            patterns,
            excluded_names: vec![config.state_file_name.clone()],
        })
    }

    /// Check whether a file name passes the extension and glob filters
    pub fn matches(&self, file_name: &str) -> bool {
        if self.excluded_names.iter().any(|excluded| excluded == file_name) {
            return false;
        }

        let has_extension = Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase() == self.extension)
            .unwrap_or(false);
        if !has_extension {
            return false;
        }

        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.patterns.is_empty()
            || self
                .patterns
                .iter()
                .any(|pattern| pattern.matches_with(file_name, options))
    }
}

/// Risultato di una discovery
#[derive(Debug, Default)]
pub struct Discovery {
    /// Matching files, in walk order (sorted by name per directory)
    pub files: Vec<PathBuf>,
    /// Entries that could not be read and were skipped
    pub inaccessible: usize,
    /// Files still carrying a surrogate name from an interrupted run
    pub stranded: Vec<PathBuf>,
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Get information about a file (size and modification fingerprint)
    pub async fn get_file_info(path: &Path) -> std::io::Result<(u64, Fingerprint)> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok((metadata.len(), Fingerprint::from_metadata(&metadata)?))
    }

    /// Find all candidate files under `root`
    pub fn discover(root: &Path, options: &DiscoveryOptions) -> Result<Discovery, OptimizeError> {
        if !root.is_dir() {
            return Err(OptimizeError::Configuration(format!(
                "Directory '{}' not found.",
                root.display()
            )));
        }

        let max_depth = if options.recursive { usize::MAX } else { 1 };
        let mut discovery = Discovery::default();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    let err = OptimizeError::Discovery {
                        path,
                        message: e.to_string(),
                    };
                    warn!("Skipping: {}", err);
                    discovery.inaccessible += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            if safe_name::is_surrogate_name(&file_name) {
                warn!(
                    "{} looks like a file left under a temporary name by an interrupted run; rename it back manually",
                    entry.path().display()
                );
                discovery.stranded.push(entry.path().to_path_buf());
                continue;
            }

            if options.matches(&file_name) {
                discovery.files.push(entry.path().to_path_buf());
            }
        }

        debug!(
            "Discovered {} files under {} ({} inaccessible entries)",
            discovery.files.len(),
            root.display(),
            discovery.inaccessible
        );
        Ok(discovery)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"png").unwrap();
    }

    fn names(discovery: &Discovery, root: &Path) -> Vec<String> {
        discovery
            .files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_non_recursive_only_direct_children() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("A.PNG"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("sub").join("c.png"));

        let options = DiscoveryOptions::from_config(&Config::default()).unwrap();
        let discovery = FileManager::discover(dir.path(), &options).unwrap();
        assert_eq!(names(&discovery, dir.path()), vec!["A.PNG", "b.png"]);
    }

    #[test]
    fn test_recursive_walks_subdirectories() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.png"));
        touch(&dir.path().join("sub").join("deeper").join("c.png"));

        let config = Config {
            recursive: true,
            ..Default::default()
        };
        let options = DiscoveryOptions::from_config(&config).unwrap();
        let discovery = FileManager::discover(dir.path(), &options).unwrap();
        assert_eq!(names(&discovery, dir.path()), vec!["a.png", "sub/deeper/c.png"]);
    }

    #[test]
    fn test_state_file_and_surrogates_are_excluded() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.png"));
        touch(&dir.path().join(".optimized_png_timestamps.json"));
        touch(&dir.path().join(".pngopt-0123456789abcdef.png"));

        let options = DiscoveryOptions::from_config(&Config::default()).unwrap();
        let discovery = FileManager::discover(dir.path(), &options).unwrap();
        assert_eq!(names(&discovery, dir.path()), vec!["a.png"]);
        assert_eq!(discovery.stranded.len(), 1);
    }

    #[test]
    fn test_glob_filters_are_case_insensitive() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("Icon_small.png"));
        touch(&dir.path().join("photo.png"));

        let config = Config {
            include_patterns: vec!["icon_*".to_string()],
            ..Default::default()
        };
        let options = DiscoveryOptions::from_config(&config).unwrap();
        let discovery = FileManager::discover(dir.path(), &options).unwrap();
        assert_eq!(names(&discovery, dir.path()), vec!["Icon_small.png"]);
    }

    #[test]
    fn test_missing_root_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let options = DiscoveryOptions::from_config(&Config::default()).unwrap();
        let err = FileManager::discover(&dir.path().join("nope"), &options).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(1536), "1.50 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(0, 0), 0.0);
        assert_eq!(FileManager::calculate_reduction(200, 150), 25.0);
    }
}
