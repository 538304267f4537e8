//! Error types for the cache flusher

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while flushing cache drives
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // =========================================================================
    // Startup Errors
    // =========================================================================
    /// Missing required field, unknown policy or non-existent declared path
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // =========================================================================
    // Drive Errors
    // =========================================================================
    /// Free-space probe failed
    #[error("Free-space probe failed for {}: {reason}", path.display())]
    ProbeFailed { path: PathBuf, reason: String },

    /// Directory traversal failed
    #[error("Failed to walk {}: {reason}", path.display())]
    Walk { path: PathBuf, reason: String },

    // =========================================================================
    // Per-File Errors
    // =========================================================================
    /// Destination already present in the backing pool
    #[error("Destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    /// open/read/write/sync/unlink/chown/chmod failure during a move
    #[error("{op} failed for {}: {source}", path.display())]
    MoveIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // =========================================================================
    // Notification Errors
    // =========================================================================
    /// Notification delivery failed
    #[error("Notification failed: {0}")]
    NotificationFailed(String),
}

/// Stable classification of [`Error`] values.
///
/// Used as a metrics label and in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigInvalid,
    ProbeFailed,
    WalkError,
    DestinationExists,
    IoFailure,
    NotificationFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConfigInvalid => write!(f, "config_invalid"),
            ErrorKind::ProbeFailed => write!(f, "probe_failed"),
            ErrorKind::WalkError => write!(f, "walk_error"),
            ErrorKind::DestinationExists => write!(f, "destination_exists"),
            ErrorKind::IoFailure => write!(f, "io_failure"),
            ErrorKind::NotificationFailed => write!(f, "notification_failed"),
        }
    }
}

impl Error {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::MoveIo { .. } | Error::Metrics(_) => ErrorKind::IoFailure,
            Error::Yaml(_) | Error::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Error::ProbeFailed { .. } => ErrorKind::ProbeFailed,
            Error::Walk { .. } => ErrorKind::WalkError,
            Error::DestinationExists { .. } => ErrorKind::DestinationExists,
            Error::NotificationFailed(_) => ErrorKind::NotificationFailed,
        }
    }

    /// Wrap an I/O error raised by a named move step
    pub(crate) fn move_io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::MoveIo {
            op,
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::NotificationFailed(e.to_string())
    }
}
