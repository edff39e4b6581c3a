//! Error types for the sync engine library

use std::path::PathBuf;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type covering every failure a sync run can report
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path-related errors
    #[error("Path error at '{path}': {message}")]
    Path { path: PathBuf, message: String },

    /// Copying a file into the destination failed
    #[error("Cannot copy to '{destination}': {message}")]
    FileCopy { destination: PathBuf, message: String },

    /// Creating a destination directory failed
    #[error("Cannot create directory '{path}': {message}")]
    CreateDirectory { path: PathBuf, message: String },

    /// Replacing a destination entry of a different type failed
    #[error("Cannot overwrite '{path}': {message}")]
    Overwrite { path: PathBuf, message: String },

    /// Removing a stale destination entry failed
    #[error("File deletion error at '{path}': {message}")]
    FileDeletion { path: PathBuf, message: String },

    /// A glob pattern could not be compiled or a listing failed
    #[error("Glob expansion failed for '{pattern}': {message}")]
    GlobExpansion { pattern: String, message: String },

    /// Hash computation errors
    #[error("Hash computation error for '{path}': {message}")]
    Hash { path: PathBuf, message: String },

    /// Directory scanning errors
    #[error("Directory scan error at '{path}': {message}")]
    DirectoryScan { path: PathBuf, message: String },

    /// Invalid task configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A recoverable failure escalated by `fail_on_error`
    #[error("Sync aborted: {0}")]
    Fatal(String),

    /// Task file parse errors
    #[error("Task file parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a new path error
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file copy error
    pub fn copy_error(destination: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileCopy {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create a new directory creation error
    pub fn mkdir_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CreateDirectory {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new overwrite error
    pub fn overwrite_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Overwrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file deletion error
    pub fn deletion_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileDeletion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new glob expansion error
    pub fn glob_error(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GlobExpansion {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a new hash error
    pub fn hash_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Hash {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new directory scan error
    pub fn scan_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DirectoryScan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error terminates the whole run rather than a single pair
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Fatal(_) | Self::GlobExpansion { .. } | Self::DirectoryScan { .. } | Self::Config(_)
        )
    }

    /// Escalate a recoverable failure into a run-terminating one
    pub fn into_fatal(self) -> Self {
        match self {
            fatal if fatal.is_fatal() => fatal,
            other => Self::Fatal(other.to_string()),
        }
    }
}
