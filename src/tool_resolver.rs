//! # Tool Path Resolver
//!
//! Finds the external optimizer binary before a run starts:
//! - Explicit paths (absolute or containing a separator) are checked as given
//! - Bare names are searched in `PATH` (with `.exe` appended on Windows)

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tool path resolver over a list of search directories
#[derive(Debug, Clone)]
pub struct ToolPathResolver {
    search_dirs: Vec<PathBuf>,
}

impl ToolPathResolver {
    /// Create a resolver over the current `PATH`
    pub fn new() -> Self {
        let search_dirs = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self { search_dirs }
    }

    /// Create a resolver over explicit directories
    pub fn with_search_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool: &Path) -> Option<PathBuf> {
        debug!("Resolving tool: {}", tool.display());

        if Self::is_explicit_path(tool) {
            return tool.is_file().then(|| tool.to_path_buf());
        }

        let file_name = Self::executable_name(tool);
        let found = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file());

        match &found {
            Some(path) => debug!("Using system tool: {} -> {}", tool.display(), path.display()),
            None => debug!("Tool not found in search path: {}", tool.display()),
        }
        found
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool: &Path) -> bool {
        self.resolve_tool(tool).is_some()
    }

    fn is_explicit_path(tool: &Path) -> bool {
        tool.is_absolute() || tool.components().count() > 1
    }

    fn executable_name(tool: &Path) -> OsString {
        let mut name = tool.as_os_str().to_os_string();
        if cfg!(windows) && tool.extension().is_none() {
            name.push(".exe");
        }
        name
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolves_bare_name_in_search_dirs() {
        let dir = TempDir::new().unwrap();
        let name = if cfg!(windows) { "optipng.exe" } else { "optipng" };
        std::fs::write(dir.path().join(name), b"").unwrap();

        let resolver = ToolPathResolver::with_search_dirs(vec![dir.path().to_path_buf()]);
        assert_eq!(
            resolver.resolve_tool(Path::new("optipng")),
            Some(dir.path().join(name))
        );
        assert!(!resolver.is_tool_available(Path::new("pngcrush")));
    }

    #[test]
    fn test_explicit_path_is_checked_as_given() {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("optipngp");
        let resolver = ToolPathResolver::with_search_dirs(Vec::new());

        assert_eq!(resolver.resolve_tool(&tool), None);
        std::fs::write(&tool, b"#!/bin/sh\n").unwrap();
        assert_eq!(resolver.resolve_tool(&tool), Some(tool));
    }
}
