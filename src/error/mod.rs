//! Error types and Result aliases for Mooring.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using Mooring's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Mooring operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The workspace is not a git repository.
    #[error("workspace '{path}' is not a git repository")]
    NotARepo { path: String },

    /// Git subprocess error.
    #[error("git error: {0}")]
    Git(#[from] GitError),

    /// Remote index service error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Client cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Git subprocess errors.
#[derive(Error, Debug)]
pub enum GitError {
    /// The git binary could not be launched.
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    /// A git command exited non-zero.
    #[error("'{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// A git command produced output we could not interpret.
    #[error("'{command}' produced unexpected output: {reason}")]
    UnexpectedOutput { command: String, reason: String },
}

/// Remote index service errors.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The service answered with an error status.
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced an HTTP response.
    #[error("transport failure: {reason}")]
    Transport { reason: String },
}

/// Client cache errors.
///
/// The store logs and swallows these; the type exists so the log line can say
/// why the cache was dropped.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing the cache file failed.
    #[error("cache file '{path}': {reason}")]
    File { path: String, reason: String },

    /// The cache document did not decode.
    #[error("cache document invalid: {0}")]
    Decode(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// File processing error.
    #[error("failed to process file '{path}': {reason}")]
    ProcessFailed { path: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a failed upsert may be retried with this error.
    ///
    /// Transport failures and 5xx responses are transient; 4xx responses are
    /// the caller's fault and surface immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(RemoteError::Transport { .. }) => true,
            Self::Remote(RemoteError::Status { status, .. }) => *status >= 500,
            _ => false,
        }
    }
}

impl RemoteError {
    /// Create a transport error from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport {
            reason: cause.to_string(),
        }
    }
}

/// Condense a list of per-file errors into one human-readable line.
///
/// At most five errors are spelled out; the rest collapse into an
/// "(and N more)" suffix.
#[must_use]
pub fn summarize_errors(errors: &[String]) -> String {
    const SHOWN: usize = 5;

    let mut summary = errors
        .iter()
        .take(SHOWN)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");

    if errors.len() > SHOWN {
        use std::fmt::Write;
        let _ = write!(summary, " (and {} more)", errors.len() - SHOWN);
    }

    summary
}
