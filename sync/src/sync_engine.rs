//! Run orchestration: expand, sync every pair, then prune each destination root

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::comparator::{ComparisonMethod, FileComparator};
use crate::config::{OneOrMany, TaskConfig};
use crate::error::{Result, SyncError};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::mapping::MappingDefinition;
use crate::metrics::SyncMetrics;
use crate::pair::PairSynchronizer;
use crate::progress::{LogChannel, ProgressReporter, SyncPhase};
use crate::prune::PruneEngine;
use crate::tracker::DestinationTracker;

/// Options for a sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Delete destination entries that no longer come from any source
    #[serde(alias = "updateAndDelete")]
    pub update_and_delete: bool,
    /// Log intended actions without touching the destination
    pub pretend: bool,
    /// Abort the run on the first failed action
    #[serde(alias = "failOnError")]
    pub fail_on_error: bool,
    /// Log actions at info level instead of debug
    pub verbose: bool,
    /// Destination patterns never pruned
    #[serde(alias = "ignoreInDest")]
    pub ignore_in_dest: Option<OneOrMany>,
    /// `mtime` or `hash`
    #[serde(alias = "compareUsing")]
    pub compare_using: String,
    /// Pairs in flight at once
    #[serde(alias = "maxConcurrency")]
    pub max_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            update_and_delete: false,
            pretend: false,
            fail_on_error: false,
            verbose: false,
            ignore_in_dest: None,
            compare_using: "mtime".to_string(),
            max_concurrency: 64,
        }
    }
}

impl SyncOptions {
    /// Resolve `compare_using`; unknown names fall back to mtime after
    /// `on_invalid` is handed a warning.
    pub fn comparison_method(&self, on_invalid: impl FnOnce(String)) -> ComparisonMethod {
        ComparisonMethod::resolve(&self.compare_using, on_invalid)
    }

    pub fn log_channel(&self) -> LogChannel {
        LogChannel::from_verbose(self.verbose)
    }

    pub fn ignore_patterns(&self) -> &[String] {
        self.ignore_in_dest.as_ref().map(OneOrMany::as_slice).unwrap_or(&[])
    }
}

/// Main sync engine
pub struct SyncEngine<F: FileSystem = LocalFileSystem> {
    options: SyncOptions,
    fs: F,
    reporter: ProgressReporter,
}

impl SyncEngine<LocalFileSystem> {
    /// Engine over the local filesystem
    pub fn new(options: SyncOptions) -> Self {
        Self::with_filesystem(options, LocalFileSystem::new())
    }
}

impl<F: FileSystem> SyncEngine<F> {
    pub fn with_filesystem(options: SyncOptions, fs: F) -> Self {
        let reporter = ProgressReporter::new(options.log_channel());
        Self { options, fs, reporter }
    }

    /// Replace the reporter, e.g. with one attached to a [`crate::ProgressChannel`]
    pub fn with_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Expand a task's rules against this engine's filesystem and run them
    pub async fn run_task(&self, task: &TaskConfig) -> Result<SyncMetrics> {
        let definitions = match task.expand(&self.fs).await {
            Ok(definitions) => definitions,
            Err(e) => {
                self.reporter.sync_failed(e.to_string());
                return Err(e);
            }
        };

        self.run(&definitions).await
    }

    /// Run the whole pipeline over already expanded definitions.
    ///
    /// Completes once every pair settled and, with `update_and_delete`, every
    /// destination root was pruned. Fatal errors end the run early.
    pub async fn run(&self, definitions: &[MappingDefinition]) -> Result<SyncMetrics> {
        let mut metrics = SyncMetrics::new(self.reporter.session_id(), self.options.pretend);

        match self.execute(definitions, &mut metrics).await {
            Ok(()) => {
                metrics.complete();
                self.reporter.phase(SyncPhase::Done);
                self.reporter.info(metrics.summary());
                self.reporter.sync_completed();
                Ok(metrics)
            }
            Err(e) => {
                self.reporter.sync_failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(&self, definitions: &[MappingDefinition], metrics: &mut SyncMetrics) -> Result<()> {
        let method = self
            .options
            .comparison_method(|message| self.reporter.warning(message, None));
        let tracker = DestinationTracker::new();
        let pruning = self.options.update_and_delete;

        self.reporter.phase(SyncPhase::Expanding);
        let mut pairs = Vec::new();
        for definition in definitions {
            let root = tracker.keep_root(&definition.destination_root);
            pairs.extend(definition.pairs().into_iter().map(|pair| (root.clone(), pair)));
        }

        tracing::debug!(
            definitions = definitions.len(),
            pairs = pairs.len(),
            compare = %method,
            "resolved sync pairs"
        );

        self.reporter.phase(SyncPhase::Syncing);
        let synchronizer = PairSynchronizer::new(
            &self.fs,
            FileComparator::new(method),
            &self.reporter,
            self.options.pretend,
            self.options.fail_on_error,
        );

        let mut outcomes = stream::iter(&pairs)
            .map(|(root, pair)| {
                if pruning {
                    tracker.keep(root, &pair.destination);
                }
                synchronizer.sync(pair)
            })
            .buffer_unordered(self.options.max_concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            metrics.record_pair(&outcome?);
        }
        drop(outcomes);

        if !pruning {
            return Ok(());
        }

        self.reporter.phase(SyncPhase::Pruning);
        let pruner = PruneEngine::new(&self.fs, &self.reporter, self.options.pretend);
        let mut delete_failures = 0;

        for root in tracker.roots() {
            let keep = tracker.keep_set(&root);
            let report = pruner.prune(&root, &keep, self.options.ignore_patterns()).await?;

            metrics.record_prune(report.unlinked.len(), report.removed_dirs.len(), &report.failures);
            delete_failures += report.failures.len();
        }

        if self.options.fail_on_error && delete_failures > 0 {
            return Err(SyncError::Fatal(format!(
                "{} stale destination entries could not be removed",
                delete_failures
            )));
        }

        Ok(())
    }
}
