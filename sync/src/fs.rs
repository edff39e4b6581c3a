//! Filesystem primitives the engine is written against
//!
//! Everything the sync and prune phases do to disk goes through
//! [`FileSystem`], which keeps the algorithms testable against a recording
//! or failing implementation. [`LocalFileSystem`] is the real one.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{Result, SyncError};
use crate::filter::PatternSet;
use crate::scanner::{DirectoryScanner, ScanOptions};

/// The subset of metadata the engine decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_dir: bool,
    /// Only ever set by [`FileSystem::symlink_metadata`]
    pub is_symlink: bool,
    pub modified: SystemTime,
}

impl From<std::fs::Metadata> for EntryMeta {
    fn from(metadata: std::fs::Metadata) -> Self {
        Self {
            is_dir: metadata.is_dir(),
            is_symlink: metadata.file_type().is_symlink(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// Filesystem operations consumed by the engine
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Metadata for `path`; fails with `NotFound` when absent
    async fn stat(&self, path: &Path) -> io::Result<EntryMeta>;

    /// Metadata for `path` itself, without following a final symlink
    async fn symlink_metadata(&self, path: &Path) -> io::Result<EntryMeta>;

    /// Copy a file, creating missing parent directories
    async fn copy(&self, source: &Path, destination: &Path) -> io::Result<()>;

    /// Create a directory and any missing parents
    async fn make_dir(&self, path: &Path) -> io::Result<()>;

    /// Remove a file, or a directory with everything beneath it
    async fn delete(&self, path: &Path) -> io::Result<()>;

    /// Remove a single file
    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory
    async fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Root-relative paths under `root` matching `patterns`
    async fn list_recursive(&self, root: &Path, patterns: &PatternSet, include_dotfiles: bool) -> Result<Vec<PathBuf>>;

    /// Hex digest of a file's content
    async fn content_hash(&self, path: &Path) -> Result<String>;
}

/// [`FileSystem`] backed by `tokio::fs`
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    /// Read buffer size used while hashing
    buffer_size: usize,
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self {
            buffer_size: 64 * 1024, // 64KB
        }
    }

    /// Create a filesystem with a custom hashing buffer size
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn stat(&self, path: &Path) -> io::Result<EntryMeta> {
        fs::metadata(path).await.map(EntryMeta::from)
    }

    async fn symlink_metadata(&self, path: &Path) -> io::Result<EntryMeta> {
        fs::symlink_metadata(path).await.map(EntryMeta::from)
    }

    async fn copy(&self, source: &Path, destination: &Path) -> io::Result<()> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        fs::copy(source, destination).await.map(|_| ())
    }

    async fn make_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path).await?.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        }
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path).await
    }

    async fn list_recursive(&self, root: &Path, patterns: &PatternSet, include_dotfiles: bool) -> Result<Vec<PathBuf>> {
        let scanner = DirectoryScanner::new(ScanOptions { include_dotfiles });
        scanner.list(root, patterns)
    }

    async fn content_hash(&self, path: &Path) -> Result<String> {
        let mut file = fs::File::open(path).await.map_err(|e| {
            SyncError::hash_error(path, format!("Failed to open file: {}", e))
        })?;

        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let bytes_read = file.read(&mut buffer).await.map_err(|e| {
                SyncError::hash_error(path, format!("Failed to read file: {}", e))
            })?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize().to_hex().to_string())
    }
}
