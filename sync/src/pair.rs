//! Create/update/overwrite decision for a single source -> destination pair

use std::path::Path;

use crate::comparator::FileComparator;
use crate::error::{Result, SyncError};
use crate::fs::{EntryMeta, FileSystem};
use crate::mapping::SyncPair;
use crate::progress::{FileOperation, ProgressReporter};

/// What happened to one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// Destination was missing; an empty directory was created
    CreatedDirectory,
    /// Destination was missing; the source file was copied
    Copied,
    /// Destination file was older (or different) and was replaced
    Updated,
    /// Destination had the other entry type and was replaced
    Overwritten,
    /// Nothing to do
    Unchanged,
    /// A recoverable failure, already reported as a warning
    Skipped(String),
}

impl PairOutcome {
    /// The destination mutation behind this outcome, if any
    pub fn operation(&self) -> Option<FileOperation> {
        match self {
            PairOutcome::CreatedDirectory => Some(FileOperation::CreateDirectory),
            PairOutcome::Copied => Some(FileOperation::Copy),
            PairOutcome::Updated => Some(FileOperation::Update),
            PairOutcome::Overwritten => Some(FileOperation::Overwrite),
            PairOutcome::Unchanged | PairOutcome::Skipped(_) => None,
        }
    }
}

/// Brings one destination entry in line with its source
pub struct PairSynchronizer<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    comparator: FileComparator,
    reporter: &'a ProgressReporter,
    dry_run: bool,
    fail_on_error: bool,
}

impl<'a, F: FileSystem + ?Sized> PairSynchronizer<'a, F> {
    pub fn new(
        fs: &'a F,
        comparator: FileComparator,
        reporter: &'a ProgressReporter,
        dry_run: bool,
        fail_on_error: bool,
    ) -> Self {
        Self {
            fs,
            comparator,
            reporter,
            dry_run,
            fail_on_error,
        }
    }

    /// Synchronize one pair.
    ///
    /// Failures of the pair's own action come back as
    /// [`PairOutcome::Skipped`] after a warning, or as a fatal error when
    /// `fail_on_error` is set.
    pub async fn sync(&self, pair: &SyncPair) -> Result<PairOutcome> {
        match self.apply(pair).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if self.fail_on_error || e.is_fatal() => Err(e.into_fatal()),
            Err(e) => {
                let message = e.to_string();
                self.reporter.warning(message.clone(), Some(&pair.destination));
                Ok(PairOutcome::Skipped(message))
            }
        }
    }

    async fn apply(&self, pair: &SyncPair) -> Result<PairOutcome> {
        let source = pair.source.as_path();
        let destination = pair.destination.as_path();

        let (source_meta, destination_meta) = tokio::join!(self.fs.stat(source), self.fs.stat(destination));

        let Ok(destination_meta) = destination_meta else {
            return self.create(source, source_meta.ok(), destination).await;
        };

        let source_meta = source_meta
            .map_err(|e| SyncError::copy_error(destination, format!("Cannot read source '{}': {}", source.display(), e)))?;

        if source_meta.is_dir != destination_meta.is_dir {
            return self.overwrite(source, &source_meta, destination).await;
        }

        if source_meta.is_dir {
            return Ok(PairOutcome::Unchanged);
        }

        let unchanged = self
            .comparator
            .unchanged(self.fs, source, &source_meta, destination, &destination_meta)
            .await?;

        if unchanged {
            return Ok(PairOutcome::Unchanged);
        }

        self.reporter.action(FileOperation::Update, Some(source), destination, self.dry_run);
        if !self.dry_run {
            self.fs
                .copy(source, destination)
                .await
                .map_err(|e| SyncError::copy_error(destination, e.to_string()))?;
        }

        Ok(PairOutcome::Updated)
    }

    /// Destination is missing
    async fn create(&self, source: &Path, source_meta: Option<EntryMeta>, destination: &Path) -> Result<PairOutcome> {
        if source_meta.is_some_and(|meta| meta.is_dir) {
            self.reporter.action(FileOperation::CreateDirectory, None, destination, self.dry_run);
            if !self.dry_run {
                self.fs
                    .make_dir(destination)
                    .await
                    .map_err(|e| SyncError::mkdir_error(destination, e.to_string()))?;
            }
            return Ok(PairOutcome::CreatedDirectory);
        }

        self.reporter.action(FileOperation::Copy, Some(source), destination, self.dry_run);
        if !self.dry_run {
            self.fs
                .copy(source, destination)
                .await
                .map_err(|e| SyncError::copy_error(destination, e.to_string()))?;
        }

        Ok(PairOutcome::Copied)
    }

    /// Destination exists with the other entry type
    async fn overwrite(&self, source: &Path, source_meta: &EntryMeta, destination: &Path) -> Result<PairOutcome> {
        self.reporter.action(FileOperation::Overwrite, Some(source), destination, self.dry_run);
        if self.dry_run {
            return Ok(PairOutcome::Overwritten);
        }

        let overwrite_error = |e: std::io::Error| SyncError::overwrite_error(destination, e.to_string());

        self.fs.delete(destination).await.map_err(overwrite_error)?;
        if source_meta.is_dir {
            self.fs.make_dir(destination).await.map_err(overwrite_error)?;
        } else {
            self.fs.copy(source, destination).await.map_err(overwrite_error)?;
        }

        Ok(PairOutcome::Overwritten)
    }
}
