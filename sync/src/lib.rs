//! Treesync Library
//!
//! One-way directory synchronization with optional pruning:
//! - Mapping rules expanded from glob patterns into source/destination pairs
//! - Per-pair create, update and type-overwrite decisions
//! - Pluggable change detection (modification time or content hash)
//! - Keep-set tracking and pruning of stale destination entries
//! - Dry-run mode and a typed progress event stream

pub mod error;
pub mod paths;
pub mod filter;
pub mod scanner;
pub mod fs;
pub mod comparator;
pub mod progress;
pub mod tracker;
pub mod mapping;
pub mod pair;
pub mod prune;
pub mod metrics;
pub mod config;
pub mod sync_engine;

// Re-export main types and functions
pub use comparator::{ComparisonMethod, FileComparator};
pub use config::{OneOrMany, TaskConfig, TaskFile};
pub use error::{Result, SyncError};
pub use filter::{FilterOptions, PatternSet};
pub use fs::{EntryMeta, FileSystem, LocalFileSystem};
pub use mapping::{MappingDefinition, MappingExpander, MappingRule, SyncPair};
pub use metrics::{FileStats, SyncMetrics};
pub use pair::{PairOutcome, PairSynchronizer};
pub use progress::{FileOperation, LogChannel, ProgressChannel, ProgressEvent, ProgressReporter, Severity, SyncPhase};
pub use prune::{PruneEngine, PruneReport};
pub use scanner::{DirectoryScanner, ScanOptions};
pub use sync_engine::{SyncEngine, SyncOptions};
pub use tracker::DestinationTracker;

use std::path::Path;

/// Run one task against the local filesystem using the task's own options
pub async fn sync_task(task: &TaskConfig) -> Result<SyncMetrics> {
    let engine = SyncEngine::new(task.options.clone());
    engine.run_task(task).await
}

/// Mirror everything under `source` into `destination`
pub async fn mirror_directory(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: SyncOptions,
) -> Result<SyncMetrics> {
    let task = TaskConfig {
        options,
        files: vec![MappingRule {
            cwd: Some(source.as_ref().to_path_buf()),
            src: OneOrMany::from("**"),
            dest: destination.as_ref().to_path_buf(),
            expand: false,
        }],
        ..Default::default()
    };

    sync_task(&task).await
}
