//! Configuration structures for globscan.
//!
//! - [`ScanOptions`] - every option recognized by the scanner and its queue
//! - [`Config`] - root configuration, loadable from a JSON file
//!
//! All configuration types implement [`Default`]; missing JSON fields fall
//! back to those defaults.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extensions::ExtensionSet;

/// Options controlling a directory scan.
///
/// # Examples
///
/// ```
/// use gs_core::ScanOptions;
///
/// let options = ScanOptions::default();
/// assert!(!options.asynchronous);
/// assert_eq!(options.pool_concurrency, 4);
/// assert_eq!(options.queue_poll_delay_ms, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)] // Each flag is an independent option
pub struct ScanOptions {
    /// Run the walk on background producer threads instead of inline.
    pub asynchronous: bool,

    /// Number of dedicated producer (driver) threads in asynchronous mode.
    pub producer_threads: usize,

    /// Maximum number of queued results before producers block.
    /// `0` means unbounded.
    pub queue_limit: usize,

    /// How long a blocked producer sleeps between rechecks, in milliseconds.
    pub queue_poll_delay_ms: u64,

    /// Dequeue from a random position when more than ten results are queued.
    pub randomize: bool,

    /// Start with producers paused.
    pub paused: bool,

    /// Core concurrency of the worker pool. `0` disables offloading.
    pub pool_concurrency: usize,

    /// Extensions whose files are never reported.
    pub excluded_extensions: ExtensionSet,

    /// Drop files whose name contains a code point below `0x20`.
    pub reject_control_chars: bool,

    /// Sort each directory's children by absolute path before matching.
    pub sort_children: bool,

    /// Descend into symbolically linked directories.
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            asynchronous: false,
            producer_threads: 1,
            queue_limit: 0,
            queue_poll_delay_ms: 100,
            randomize: false,
            paused: false,
            pool_concurrency: 4,
            excluded_extensions: ExtensionSet::new(),
            reject_control_chars: false,
            sort_children: false,
            follow_links: false,
        }
    }
}

impl ScanOptions {
    /// Checks option values that cannot be represented by the types alone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if `producer_threads` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.producer_threads == 0 {
            return Err(ConfigError::invalid_option(
                "producer_threads",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Root configuration for globscan.
///
/// # Examples
///
/// ```
/// use gs_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"scan": {"asynchronous": true}}"#).unwrap();
/// assert!(config.scan.asynchronous);
/// assert_eq!(config.scan.producer_threads, 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scanner configuration.
    pub scan: ScanOptions,
}

impl Config {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file can't be read,
    /// [`ConfigError::Parse`] if it isn't valid JSON for [`Config`], or
    /// [`ConfigError::InvalidOption`] if validation fails.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.scan.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_scan_options_defaults() {
        let options = ScanOptions::default();
        assert!(!options.asynchronous);
        assert_eq!(options.producer_threads, 1);
        assert_eq!(options.queue_limit, 0);
        assert!(!options.randomize);
        assert!(!options.paused);
        assert!(options.excluded_extensions.is_empty());
        assert!(!options.reject_control_chars);
        assert!(!options.sort_children);
        assert!(!options.follow_links);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_producer_threads_rejected() {
        let options = ScanOptions {
            producer_threads: 0,
            ..ScanOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"scan": {"queue_limit": 64, "excluded_extensions": ["tmp"]}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.scan.queue_limit, 64);
        assert_eq!(config.scan.excluded_extensions.len(), 1);
        // Other fields should have defaults
        assert_eq!(config.scan.pool_concurrency, 4);
        assert_eq!(config.scan.queue_poll_delay_ms, 100);
    }

    #[test]
    fn test_config_json_shape() {
        let config = Config::default();
        insta::assert_json_snapshot!(config, @r#"
        {
          "scan": {
            "asynchronous": false,
            "producer_threads": 1,
            "queue_limit": 0,
            "queue_poll_delay_ms": 100,
            "randomize": false,
            "paused": false,
            "pool_concurrency": 4,
            "excluded_extensions": [],
            "reject_control_chars": false,
            "sort_children": false,
            "follow_links": false
          }
        }
        "#);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("globscan.json")).unwrap();
        std::fs::write(&path, r#"{"scan": {"sort_children": true}}"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert!(config.scan.sort_children);
    }

    #[test]
    fn test_from_json_file_rejects_invalid_option() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("globscan.json")).unwrap();
        std::fs::write(&path, r#"{"scan": {"producer_threads": 0}}"#).unwrap();

        assert!(matches!(
            Config::from_json_file(&path),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = Config::from_json_file(Utf8Path::new("/nonexistent/globscan.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
