//! Per-run counters and the summary handed back to callers

use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::pair::PairOutcome;

/// Counts of what a run did to the destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    /// Pairs processed
    pub pairs: usize,
    /// Directories created for missing destinations
    pub directories_created: usize,
    /// Files copied to missing destinations
    pub copied: usize,
    /// Files replaced because the source changed
    pub updated: usize,
    /// Entries replaced because the type differed
    pub overwritten: usize,
    /// Pairs needing no action
    pub unchanged: usize,
    /// Pairs skipped after a recovered failure
    pub skipped: usize,
    /// Stale files removed
    pub unlinked: usize,
    /// Stale directories removed
    pub directories_removed: usize,
    /// Stale entries that could not be removed
    pub delete_failures: usize,
}

impl FileStats {
    /// Number of mutating actions (performed, or intended in a dry run)
    pub fn actions(&self) -> usize {
        self.directories_created
            + self.copied
            + self.updated
            + self.overwritten
            + self.unlinked
            + self.directories_removed
    }
}

/// Metrics for one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMetrics {
    /// Unique session identifier
    pub session_id: Uuid,
    /// Start time of the sync run
    pub start_time: DateTime<Utc>,
    /// End time of the sync run
    pub end_time: Option<DateTime<Utc>>,
    /// Total duration of the sync run
    pub duration: Duration,
    /// Whether destinations were left untouched
    pub dry_run: bool,
    /// File statistics
    pub files: FileStats,
    /// Recovered failures, in the order they were met
    pub warnings: Vec<String>,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new(Uuid::nil(), false)
    }
}

impl SyncMetrics {
    pub fn new(session_id: Uuid, dry_run: bool) -> Self {
        Self {
            session_id,
            start_time: Utc::now(),
            end_time: None,
            duration: Duration::ZERO,
            dry_run,
            files: FileStats::default(),
            warnings: Vec::new(),
        }
    }

    /// Mark the run complete
    pub fn complete(&mut self) {
        let now = Utc::now();
        self.end_time = Some(now);
        self.duration = (now - self.start_time).to_std().unwrap_or_default();
    }

    /// Record a settled pair
    pub fn record_pair(&mut self, outcome: &PairOutcome) {
        self.files.pairs += 1;
        match outcome {
            PairOutcome::CreatedDirectory => self.files.directories_created += 1,
            PairOutcome::Copied => self.files.copied += 1,
            PairOutcome::Updated => self.files.updated += 1,
            PairOutcome::Overwritten => self.files.overwritten += 1,
            PairOutcome::Unchanged => self.files.unchanged += 1,
            PairOutcome::Skipped(message) => {
                self.files.skipped += 1;
                self.warnings.push(message.clone());
            }
        }
    }

    /// Fold in the result of pruning one root
    pub fn record_prune(&mut self, unlinked: usize, directories_removed: usize, failures: &[String]) {
        self.files.unlinked += unlinked;
        self.files.directories_removed += directories_removed;
        self.files.delete_failures += failures.len();
        self.warnings.extend_from_slice(failures);
    }

    /// True when no warning was recorded
    pub fn is_successful(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Pretty-printed JSON report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let prefix = if self.dry_run { "[pretend] " } else { "" };
        format!(
            "{}{} pairs in {:.2?}: {} copied, {} updated, {} overwritten, {} dirs created, {} unchanged, {} skipped; pruned {} files, {} dirs ({} failed)",
            prefix,
            self.files.pairs,
            self.duration,
            self.files.copied,
            self.files.updated,
            self.files.overwritten,
            self.files.directories_created,
            self.files.unchanged,
            self.files.skipped,
            self.files.unlinked,
            self.files.directories_removed,
            self.files.delete_failures,
        )
    }
}
