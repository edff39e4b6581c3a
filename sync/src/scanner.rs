//! Recursive glob listing of a directory tree using walkdir

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::filter::PatternSet;

/// Options for directory scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Include entries whose name (or any parent's name) starts with `.`
    pub include_dotfiles: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { include_dotfiles: true }
    }
}

/// Lists every entry under a root that matches a pattern set
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    options: ScanOptions,
}

impl DirectoryScanner {
    /// Create a new directory scanner with options
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Return root-relative paths of matching files and directories, sorted.
    ///
    /// Symlinks are listed as entries and never followed. The root itself is
    /// never listed. A root that does not exist, or is a
    /// plain file, has no entries; entries vanishing mid-walk are skipped.
    pub fn list<P: AsRef<Path>>(&self, root: P, patterns: &PatternSet) -> Result<Vec<PathBuf>> {
        let root = root.as_ref();

        if !root.is_dir() {
            tracing::trace!(root = %root.display(), "nothing to list");
            return Ok(Vec::new());
        }

        let include_dotfiles = self.options.include_dotfiles;
        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| include_dotfiles || !is_hidden(entry.path()));

        let mut entries = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => continue,
                Err(e) => {
                    return Err(SyncError::scan_error(root, format!("Walk error: {}", e)));
                }
            };

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| SyncError::path_error(entry.path(), format!("Failed to create relative path: {}", e)))?;

            if patterns.is_match(relative) {
                entries.push(relative.to_path_buf());
            }
        }

        Ok(entries)
    }
}

/// Check if a path names a hidden file or directory
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
