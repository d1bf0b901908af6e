//! Error types for the gs-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related errors
//! that can occur across the workspace.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use gs_core::ConfigError;
///
/// let error = ConfigError::invalid_option("producer_threads", "must be at least 1");
/// assert!(error.to_string().contains("producer_threads"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// The configuration file that couldn't be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("producer_threads", "must be at least 1");
        let msg = error.to_string();
        assert!(msg.contains("producer_threads"));
        assert!(msg.contains("must be at least 1"));
    }

    #[test]
    fn test_io_display() {
        let error = ConfigError::Io {
            path: Utf8PathBuf::from("/missing/globscan.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(error.to_string().contains("/missing/globscan.json"));
    }

    #[test]
    fn test_parse_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ConfigError::from(err);
        assert!(error.to_string().starts_with("failed to parse configuration"));
    }
}
