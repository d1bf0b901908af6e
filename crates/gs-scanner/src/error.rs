//! Error types for the gs-scanner crate.
//!
//! This module provides the [`ScanError`] type for errors that can occur
//! while resolving patterns and walking directory trees.

use camino::Utf8PathBuf;
use gs_core::ConfigError;
use gs_queue::{PoolError, QueueError};

/// Errors that can occur during scanning operations.
///
/// # Error Recovery Strategy
///
/// - **Pattern errors** ([`ScanError::InvalidPattern`], [`ScanError::NotADirectory`]):
///   log a warning, skip the pattern, continue with the next one
/// - **Listing errors** ([`ScanError::ReadDir`], [`ScanError::NonUtf8Path`]):
///   log a warning, skip the subtree or entry, continue the walk
/// - **Cancellation** ([`ScanError::Cancelled`]): unwind the current walk
/// - **Setup errors** ([`ScanError::Config`], [`ScanError::Pool`], [`ScanError::Queue`]):
///   fatal, returned to the caller
///
/// # Examples
///
/// ```
/// use gs_scanner::ScanError;
///
/// fn describe(err: &ScanError) -> &'static str {
///     match err {
///         ScanError::InvalidPattern { .. } | ScanError::NotADirectory(_) => "pattern skipped",
///         ScanError::ReadDir { .. } | ScanError::NonUtf8Path(_) => "entry skipped",
///         ScanError::Cancelled => "cancelled",
///         ScanError::Config(_) | ScanError::Pool(_) | ScanError::Queue(_) => "setup failed",
///     }
/// }
///
/// assert_eq!(describe(&ScanError::Cancelled), "cancelled");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The pattern can't be compiled.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern, with separators normalized.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The literal root of a pattern exists but isn't a directory.
    #[error("path '{0}' is not a directory")]
    NotADirectory(Utf8PathBuf),

    /// A directory couldn't be listed, or an entry's type couldn't be read.
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        /// The directory or entry that failed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A path is not valid UTF-8.
    ///
    /// This crate uses UTF-8 paths throughout, so such entries are skipped.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// The scan was interrupted.
    #[error("scan cancelled")]
    Cancelled,

    /// Invalid scanner options.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker pool couldn't be built.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The result queue reported an error.
    #[error(transparent)]
    Queue(QueueError),
}

impl From<QueueError> for ScanError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Interrupted => Self::Cancelled,
            other => Self::Queue(other),
        }
    }
}

impl ScanError {
    /// Creates a new [`ScanError::InvalidPattern`] error.
    #[inline]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ScanError::ReadDir`] error.
    #[inline]
    pub fn read_dir(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::ReadDir {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the scan can continue past this error.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern { .. }
                | Self::NotADirectory(_)
                | Self::ReadDir { .. }
                | Self::NonUtf8Path(_)
        )
    }

    /// Returns `true` if this error is local to one pattern.
    #[inline]
    #[must_use]
    pub const fn is_pattern_error(&self) -> bool {
        matches!(self, Self::InvalidPattern { .. } | Self::NotADirectory(_))
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::NotADirectory(path) | Self::ReadDir { path, .. } => Some(path),
            Self::InvalidPattern { .. }
            | Self::NonUtf8Path(_)
            | Self::Cancelled
            | Self::Config(_)
            | Self::Pool(_)
            | Self::Queue(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_interrupted_becomes_cancelled() {
        let err = ScanError::from(QueueError::Interrupted);
        assert!(matches!(err, ScanError::Cancelled));
        assert!(!err.is_recoverable());

        let err = ScanError::from(QueueError::EmptyQueue);
        assert!(matches!(err, ScanError::Queue(QueueError::EmptyQueue)));
    }

    #[test]
    fn test_read_dir_error() {
        let err = ScanError::read_dir(
            "/data/locked",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_recoverable());
        assert!(!err.is_pattern_error());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/data/locked"));
        assert!(err.to_string().contains("/data/locked"));
    }

    #[test]
    fn test_pattern_errors() {
        let err = ScanError::invalid_pattern("a/**", "could not finish with **");
        assert!(err.is_pattern_error());
        assert_eq!(
            err.to_string(),
            "invalid pattern 'a/**': could not finish with **"
        );

        let err = ScanError::NotADirectory(Utf8PathBuf::from("a/file.txt"));
        assert!(err.is_pattern_error());
        assert_eq!(err.path().map(|p| p.as_str()), Some("a/file.txt"));
    }

    #[test]
    fn test_setup_errors_are_fatal() {
        let err = ScanError::from(ConfigError::invalid_option("producer_threads", "zero"));
        assert!(!err.is_recoverable());
        assert!(err.path().is_none());
    }
}
