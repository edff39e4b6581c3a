//! Change detection strategies deciding whether a destination file is current

use std::fmt;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs::{EntryMeta, FileSystem};

/// Methods for comparing a source file with its destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMethod {
    /// Destination is current when it is at least as new as the source
    #[default]
    Mtime,
    /// Destination is current when both contents hash the same
    #[serde(alias = "hash", alias = "md5")]
    ContentHash,
}

impl ComparisonMethod {
    /// Parse a `compare_using` value
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mtime" => Some(Self::Mtime),
            "hash" | "md5" | "contenthash" => Some(Self::ContentHash),
            _ => None,
        }
    }

    /// Parse a `compare_using` value, falling back to `Mtime` on anything
    /// unrecognized after handing a warning message to `on_invalid`.
    pub fn resolve(name: &str, on_invalid: impl FnOnce(String)) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            on_invalid(format!(
                "Invalid 'compare_using' option '{}', falling back to default 'mtime'",
                name
            ));
            Self::Mtime
        })
    }
}

impl fmt::Display for ComparisonMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonMethod::Mtime => write!(f, "mtime"),
            ComparisonMethod::ContentHash => write!(f, "hash"),
        }
    }
}

/// Strategy resolved once per run and shared by every pair
#[derive(Debug, Clone, Copy, Default)]
pub struct FileComparator {
    method: ComparisonMethod,
}

impl FileComparator {
    /// Create a comparator for a method
    pub fn new(method: ComparisonMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> ComparisonMethod {
        self.method
    }

    /// Whether `destination` already reflects `source`.
    ///
    /// Only meaningful for two existing regular files; the engine never calls
    /// it for directories.
    pub async fn unchanged<F: FileSystem + ?Sized>(
        &self,
        fs: &F,
        source: &Path,
        source_meta: &EntryMeta,
        destination: &Path,
        destination_meta: &EntryMeta,
    ) -> Result<bool> {
        match self.method {
            ComparisonMethod::Mtime => Ok(source_meta.modified <= destination_meta.modified),
            ComparisonMethod::ContentHash => {
                let (source_hash, dest_hash) =
                    tokio::try_join!(fs.content_hash(source), fs.content_hash(destination))?;
                Ok(source_hash == dest_hash)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use filetime::{set_file_mtime, FileTime};
    use std::cell::RefCell;
    use tempfile::TempDir;
    use tokio::fs;

    #[test]
    fn test_resolve_known_methods() {
        assert_eq!(ComparisonMethod::resolve("mtime", |_| panic!("no warning expected")), ComparisonMethod::Mtime);
        assert_eq!(ComparisonMethod::resolve("hash", |_| panic!("no warning expected")), ComparisonMethod::ContentHash);
        assert_eq!(ComparisonMethod::resolve("MD5", |_| panic!("no warning expected")), ComparisonMethod::ContentHash);
    }

    #[test]
    fn test_resolve_unknown_falls_back_with_warning() {
        let warning = RefCell::new(None);

        let method = ComparisonMethod::resolve("crc32", |msg| *warning.borrow_mut() = Some(msg));

        assert_eq!(method, ComparisonMethod::Mtime);
        assert!(warning.into_inner().unwrap().contains("crc32"));
    }

    #[tokio::test]
    async fn test_mtime_comparison() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src.txt");
        let destination = temp_dir.path().join("dest.txt");
        fs::write(&source, b"hello").await.unwrap();
        fs::write(&destination, b"other").await.unwrap();

        set_file_mtime(&source, FileTime::from_unix_time(1_000, 0)).unwrap();
        set_file_mtime(&destination, FileTime::from_unix_time(2_000, 0)).unwrap();

        let local = LocalFileSystem::new();
        let comparator = FileComparator::new(ComparisonMethod::Mtime);
        let source_meta = local.stat(&source).await.unwrap();
        let dest_meta = local.stat(&destination).await.unwrap();

        assert!(comparator.unchanged(&local, &source, &source_meta, &destination, &dest_meta).await.unwrap());
        assert!(!comparator.unchanged(&local, &destination, &dest_meta, &source, &source_meta).await.unwrap());
    }

    #[tokio::test]
    async fn test_equal_mtimes_are_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src.txt");
        let destination = temp_dir.path().join("dest.txt");
        fs::write(&source, b"hello").await.unwrap();
        fs::write(&destination, b"hello").await.unwrap();
        set_file_mtime(&source, FileTime::from_unix_time(1_500, 0)).unwrap();
        set_file_mtime(&destination, FileTime::from_unix_time(1_500, 0)).unwrap();

        let local = LocalFileSystem::new();
        let source_meta = local.stat(&source).await.unwrap();
        let dest_meta = local.stat(&destination).await.unwrap();

        let unchanged = FileComparator::default()
            .unchanged(&local, &source, &source_meta, &destination, &dest_meta)
            .await
            .unwrap();
        assert!(unchanged);
    }

    #[tokio::test]
    async fn test_hash_comparison_ignores_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src.txt");
        let destination = temp_dir.path().join("dest.txt");
        fs::write(&source, b"hello world").await.unwrap();
        fs::write(&destination, b"hello world").await.unwrap();
        set_file_mtime(&source, FileTime::from_unix_time(9_000, 0)).unwrap();
        set_file_mtime(&destination, FileTime::from_unix_time(1_000, 0)).unwrap();

        let local = LocalFileSystem::new();
        let comparator = FileComparator::new(ComparisonMethod::ContentHash);
        let source_meta = local.stat(&source).await.unwrap();
        let dest_meta = local.stat(&destination).await.unwrap();

        assert!(comparator.unchanged(&local, &source, &source_meta, &destination, &dest_meta).await.unwrap());

        fs::write(&destination, b"hello rust").await.unwrap();
        let dest_meta = local.stat(&destination).await.unwrap();
        assert!(!comparator.unchanged(&local, &source, &source_meta, &destination, &dest_meta).await.unwrap());
    }
}
