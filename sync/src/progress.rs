//! Action event stream for sync runs
//!
//! A [`ProgressReporter`] is created once per run and handed to every
//! component that acts on the destination. Each event is written to
//! `tracing` (actions at `info` on the verbose channel, `debug` otherwise;
//! warnings always at `warn`) and, when a [`ProgressChannel`] is attached,
//! also delivered as a typed [`ProgressEvent`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Which channel action events are written to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogChannel {
    /// Actions are only visible at debug level
    #[default]
    Normal,
    /// Actions are logged at info level
    Verbose,
}

impl LogChannel {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }
}

/// Severity attached to every event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Destination mutations the engine reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileOperation {
    CreateDirectory,
    Copy,
    Update,
    Overwrite,
    Unlink,
    RemoveDirectory,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperation::CreateDirectory => write!(f, "Create Directory"),
            FileOperation::Copy => write!(f, "Copy"),
            FileOperation::Update => write!(f, "Update"),
            FileOperation::Overwrite => write!(f, "Overwrite"),
            FileOperation::Unlink => write!(f, "Unlink"),
            FileOperation::RemoveDirectory => write!(f, "Remove Directory"),
        }
    }
}

/// Run phases, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Expanding,
    Syncing,
    Pruning,
    Done,
}

/// Progress event types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// A phase of the run started
    PhaseStarted {
        session_id: Uuid,
        phase: SyncPhase,
    },
    /// A destination mutation was performed (or, when `dry_run`, intended)
    Action {
        operation: FileOperation,
        source_path: Option<PathBuf>,
        path: PathBuf,
        dry_run: bool,
        message: String,
    },
    /// A recovered failure
    Warning {
        message: String,
        path: Option<PathBuf>,
    },
    /// Info message
    Info {
        message: String,
    },
    /// The run finished
    SyncCompleted {
        session_id: Uuid,
        duration: Duration,
    },
    /// The run stopped on a fatal error
    SyncFailed {
        session_id: Uuid,
        error: String,
        duration: Duration,
    },
}

impl ProgressEvent {
    pub fn severity(&self) -> Severity {
        match self {
            ProgressEvent::Warning { .. } => Severity::Warning,
            ProgressEvent::SyncFailed { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }

    /// The destination path an event targets, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ProgressEvent::Action { path, .. } => Some(path),
            ProgressEvent::Warning { path, .. } => path.as_deref(),
            _ => None,
        }
    }
}

/// Progress channel for receiving events
pub struct ProgressChannel {
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressChannel {
    /// Create a reporter writing to `channel` and the receiving end
    pub fn new(channel: LogChannel) -> (ProgressReporter, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::build(channel, Some(sender));
        (reporter, Self { receiver })
    }

    /// Receive the next progress event; `None` once every reporter is dropped
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Drain every event sent so far
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Injected logging capability shared by every component of a run
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
    channel: LogChannel,
    session_id: Uuid,
    start_time: Instant,
}

impl ProgressReporter {
    /// Reporter that only writes to `tracing`
    pub fn new(channel: LogChannel) -> Self {
        Self::build(channel, None)
    }

    fn build(channel: LogChannel, sender: Option<mpsc::UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            sender,
            channel,
            session_id: Uuid::new_v4(),
            start_time: Instant::now(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn channel(&self) -> LogChannel {
        self.channel
    }

    /// Report a phase transition
    pub fn phase(&self, phase: SyncPhase) {
        tracing::debug!(session = %self.session_id, ?phase, "phase started");
        self.send(ProgressEvent::PhaseStarted {
            session_id: self.session_id,
            phase,
        });
    }

    /// Report a destination mutation
    pub fn action(&self, operation: FileOperation, source: Option<&Path>, path: &Path, dry_run: bool) {
        let message = describe(operation, source, path);
        let prefix = if dry_run { "[pretend] " } else { "" };

        match self.channel {
            LogChannel::Verbose => tracing::info!(operation = %operation, "{}{}", prefix, message),
            LogChannel::Normal => tracing::debug!(operation = %operation, "{}{}", prefix, message),
        }

        self.send(ProgressEvent::Action {
            operation,
            source_path: source.map(Path::to_path_buf),
            path: path.to_path_buf(),
            dry_run,
            message,
        });
    }

    /// Report a recovered failure
    pub fn warning(&self, message: impl Into<String>, path: Option<&Path>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.send(ProgressEvent::Warning {
            message,
            path: path.map(Path::to_path_buf),
        });
    }

    /// Report info
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        match self.channel {
            LogChannel::Verbose => tracing::info!("{}", message),
            LogChannel::Normal => tracing::debug!("{}", message),
        }
        self.send(ProgressEvent::Info { message });
    }

    /// Report the run finished
    pub fn sync_completed(&self) {
        self.send(ProgressEvent::SyncCompleted {
            session_id: self.session_id,
            duration: self.start_time.elapsed(),
        });
    }

    /// Report the run failed
    pub fn sync_failed(&self, error: impl Into<String>) {
        let error = error.into();
        tracing::error!(session = %self.session_id, "{}", error);
        self.send(ProgressEvent::SyncFailed {
            session_id: self.session_id,
            error,
            duration: self.start_time.elapsed(),
        });
    }

    fn send(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is watching.
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(LogChannel::default())
    }
}

fn describe(operation: FileOperation, source: Option<&Path>, path: &Path) -> String {
    match (operation, source) {
        (FileOperation::CreateDirectory, _) => format!("Creating {}", path.display()),
        (FileOperation::Copy, Some(source)) => {
            format!("Copying {} -> {}", source.display(), path.display())
        }
        (FileOperation::Copy, None) => format!("Copying {}", path.display()),
        (FileOperation::Update, _) => format!("Updating file {}", path.display()),
        (FileOperation::Overwrite, _) => {
            format!("Overwriting {} because type differs.", path.display())
        }
        (FileOperation::Unlink, _) => {
            format!("Unlinking {} because it was removed from src.", path.display())
        }
        (FileOperation::RemoveDirectory, _) => {
            format!("Removing dir {} because no longer in src.", path.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_channel() {
        let (reporter, mut channel) = ProgressChannel::new(LogChannel::Verbose);

        reporter.action(FileOperation::Copy, Some(Path::new("src/a.txt")), Path::new("out/a.txt"), false);
        reporter.warning("Cannot copy to out/b.txt", Some(Path::new("out/b.txt")));

        let events = channel.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ProgressEvent::Action { operation: FileOperation::Copy, message, .. } if message == "Copying src/a.txt -> out/a.txt"
        ));
        assert_eq!(events[1].severity(), Severity::Warning);
        assert_eq!(events[1].path(), Some(Path::new("out/b.txt")));
    }

    #[test]
    fn test_reporter_without_receiver_does_not_fail() {
        let (reporter, channel) = ProgressChannel::new(LogChannel::Normal);
        drop(channel);

        reporter.info("nobody is listening");
        ProgressReporter::default().warning("still fine", None);
    }

    #[tokio::test]
    async fn test_recv_ends_when_reporters_are_dropped() {
        let (reporter, mut channel) = ProgressChannel::new(LogChannel::Normal);
        let clone = reporter.clone();

        reporter.phase(SyncPhase::Syncing);
        clone.sync_completed();
        drop(reporter);
        drop(clone);

        assert!(matches!(channel.recv().await, Some(ProgressEvent::PhaseStarted { phase: SyncPhase::Syncing, .. })));
        assert!(matches!(channel.recv().await, Some(ProgressEvent::SyncCompleted { .. })));
        assert!(channel.recv().await.is_none());
    }

    #[test]
    fn test_log_channel_from_verbose() {
        assert_eq!(LogChannel::from_verbose(true), LogChannel::Verbose);
        assert_eq!(LogChannel::from_verbose(false), LogChannel::Normal);
    }
}
