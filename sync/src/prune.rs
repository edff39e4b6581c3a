//! Removal of destination entries no longer backed by any source

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use futures::future::join_all;

use crate::error::{Result, SyncError};
use crate::filter::PatternSet;
use crate::fs::FileSystem;
use crate::paths::{ancestors_between, canonical_root, normalize_path};
use crate::progress::{FileOperation, ProgressReporter};

/// What a prune pass over one root did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Files removed (or that would be, in a dry run)
    pub unlinked: Vec<PathBuf>,
    /// Directories removed, in removal order
    pub removed_dirs: Vec<PathBuf>,
    /// Deletion failures, already reported as warnings
    pub failures: Vec<String>,
}

/// Deletes everything under a root that is neither kept nor ignored
pub struct PruneEngine<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    reporter: &'a ProgressReporter,
    dry_run: bool,
}

impl<'a, F: FileSystem + ?Sized> PruneEngine<'a, F> {
    pub fn new(fs: &'a F, reporter: &'a ProgressReporter, dry_run: bool) -> Self {
        Self { fs, reporter, dry_run }
    }

    /// Stale entries under `root`: the full listing minus `keep` minus
    /// whatever `ignore_patterns` select.
    ///
    /// Listing or pattern failures are returned as errors; pruning must not
    /// run on a partial view.
    pub async fn candidates(
        &self,
        root: &Path,
        keep: &HashSet<PathBuf>,
        ignore_patterns: &[String],
    ) -> Result<Vec<PathBuf>> {
        let root = canonical_root(root);
        let everything = PatternSet::from_patterns(&["**"])?;

        let (entries, exempt) = tokio::try_join!(
            self.fs.list_recursive(&root, &everything, true),
            self.exempt_paths(&root, ignore_patterns),
        )?;

        let mut seen = HashSet::new();
        Ok(entries
            .into_iter()
            .map(|relative| normalize_path(&root.join(relative)))
            .filter(|path| *path != root)
            .filter(|path| !keep.contains(path) && !exempt.contains(path))
            .filter(|path| seen.insert(path.clone()))
            .collect())
    }

    /// Remove stale entries under `root`: files first, then directories
    /// deepest first.
    pub async fn prune(
        &self,
        root: &Path,
        keep: &HashSet<PathBuf>,
        ignore_patterns: &[String],
    ) -> Result<PruneReport> {
        let candidates = self.candidates(root, keep, ignore_patterns).await?;
        let (files, mut dirs) = self.split_files_and_dirs(candidates).await;

        let mut report = PruneReport::default();

        let removals = join_all(files.iter().map(|file| self.remove(file, FileOperation::Unlink))).await;
        for (file, removal) in files.into_iter().zip(removals) {
            match removal {
                Ok(()) => report.unlinked.push(file),
                Err(e) => report.failures.push(e.to_string()),
            }
        }

        dirs.sort_by(|a, b| {
            b.as_os_str()
                .len()
                .cmp(&a.as_os_str().len())
                .then_with(|| a.cmp(b))
        });

        for dir in dirs {
            match self.remove(&dir, FileOperation::RemoveDirectory).await {
                Ok(()) => report.removed_dirs.push(dir),
                Err(e) => report.failures.push(e.to_string()),
            }
        }

        Ok(report)
    }

    /// Paths selected by the ignore patterns, plus their parents so that a
    /// directory holding an ignored entry is never scheduled for removal.
    async fn exempt_paths(&self, root: &Path, ignore_patterns: &[String]) -> Result<HashSet<PathBuf>> {
        if ignore_patterns.is_empty() {
            return Ok(HashSet::new());
        }

        let patterns = PatternSet::from_patterns(ignore_patterns)?;
        let matched = self.fs.list_recursive(root, &patterns, true).await?;

        let mut exempt = HashSet::new();
        for relative in matched {
            let path = normalize_path(&root.join(relative));
            if let Some(parents) = ancestors_between(root, &path) {
                exempt.extend(parents);
            }
            exempt.insert(path);
        }

        Ok(exempt)
    }

    /// Entries that vanished since the listing are dropped. Symlinks count as
    /// files whatever they point at, so the link itself is unlinked.
    async fn split_files_and_dirs(&self, candidates: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let stats = join_all(candidates.iter().map(|path| self.fs.symlink_metadata(path))).await;

        let mut files = Vec::new();
        let mut dirs = Vec::new();

        for (path, stat) in candidates.into_iter().zip(stats) {
            match stat {
                Ok(meta) if meta.is_dir && !meta.is_symlink => dirs.push(path),
                Ok(_) => files.push(path),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "already gone");
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "cannot stat prune candidate, skipping");
                }
            }
        }

        (files, dirs)
    }

    async fn remove(&self, path: &Path, operation: FileOperation) -> Result<()> {
        self.reporter.action(operation, None, path, self.dry_run);
        if self.dry_run {
            return Ok(());
        }

        let removal = match operation {
            FileOperation::RemoveDirectory => self.fs.remove_dir(path).await,
            _ => self.fs.remove_file(path).await,
        };

        match removal {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                let error = SyncError::deletion_error(path, e.to_string());
                self.reporter.warning(error.to_string(), Some(path));
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use std::fs;
    use tempfile::TempDir;

    fn destination() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = normalize_path(&temp_dir.path().join("out"));
        fs::create_dir_all(root.join("old").join("deeper")).unwrap();
        fs::write(root.join("keep.txt"), b"k").unwrap();
        fs::write(root.join("stale.txt"), b"s").unwrap();
        fs::write(root.join(".hidden"), b"h").unwrap();
        fs::write(root.join("old").join("deeper").join("x.txt"), b"x").unwrap();
        (temp_dir, root)
    }

    #[tokio::test]
    async fn test_prunes_everything_not_kept() {
        let (_temp_dir, root) = destination();
        let keep = HashSet::from([root.clone(), root.join("keep.txt")]);

        let local = LocalFileSystem::new();
        let reporter = ProgressReporter::default();
        let report = PruneEngine::new(&local, &reporter, false).prune(&root, &keep, &[]).await.unwrap();

        assert!(root.join("keep.txt").exists());
        assert!(!root.join("stale.txt").exists());
        assert!(!root.join(".hidden").exists());
        assert!(!root.join("old").exists());
        assert!(root.exists());
        assert_eq!(report.unlinked.len(), 3);
        assert_eq!(report.removed_dirs, vec![root.join("old").join("deeper"), root.join("old")]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_ignored_paths_and_their_parents_survive() {
        let (_temp_dir, root) = destination();
        let keep = HashSet::from([root.clone()]);
        let ignore = vec!["stale.txt".to_string(), "old/deeper/*.txt".to_string()];

        let local = LocalFileSystem::new();
        let reporter = ProgressReporter::default();
        let report = PruneEngine::new(&local, &reporter, false).prune(&root, &keep, &ignore).await.unwrap();

        assert!(root.join("stale.txt").exists());
        assert!(root.join("old").join("deeper").join("x.txt").exists());
        assert!(!root.join("keep.txt").exists());
        assert!(report.removed_dirs.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_leaves_everything() {
        let (_temp_dir, root) = destination();
        let keep = HashSet::from([root.clone()]);

        let local = LocalFileSystem::new();
        let reporter = ProgressReporter::default();
        let report = PruneEngine::new(&local, &reporter, true).prune(&root, &keep, &[]).await.unwrap();

        assert_eq!(report.unlinked.len(), 4);
        assert_eq!(report.removed_dirs.len(), 2);
        assert!(root.join("stale.txt").exists());
        assert!(root.join("old").join("deeper").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_symlinks_are_unlinked_not_followed() {
        let (temp_dir, root) = destination();
        let elsewhere = temp_dir.path().join("elsewhere");
        fs::create_dir_all(&elsewhere).unwrap();
        fs::write(elsewhere.join("precious.txt"), b"p").unwrap();
        std::os::unix::fs::symlink(&elsewhere, root.join("dir_link")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("missing"), root.join("dangling")).unwrap();
        let keep = HashSet::from([root.clone(), root.join("keep.txt")]);

        let local = LocalFileSystem::new();
        let reporter = ProgressReporter::default();
        let report = PruneEngine::new(&local, &reporter, false).prune(&root, &keep, &[]).await.unwrap();

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert!(report.unlinked.contains(&root.join("dir_link")));
        assert!(report.unlinked.contains(&root.join("dangling")));
        assert!(fs::symlink_metadata(root.join("dir_link")).is_err());
        assert!(fs::symlink_metadata(root.join("dangling")).is_err());
        assert!(elsewhere.join("precious.txt").exists());
        assert!(root.join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_root_has_no_candidates() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("never-created");

        let local = LocalFileSystem::new();
        let reporter = ProgressReporter::default();
        let candidates = PruneEngine::new(&local, &reporter, false)
            .candidates(&root, &HashSet::new(), &[])
            .await
            .unwrap();

        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_bad_ignore_pattern_is_fatal() {
        let (_temp_dir, root) = destination();

        let local = LocalFileSystem::new();
        let reporter = ProgressReporter::default();
        let err = PruneEngine::new(&local, &reporter, false)
            .prune(&root, &HashSet::new(), &["[".to_string()])
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(root.join("stale.txt").exists());
    }
}
