//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Soft character budget per chunk.
    pub max_chars: usize,
    /// Minimum characters before a chunk may be emitted.
    pub min_chars: usize,
    /// Lines carried over from the end of one chunk into the next.
    pub overlap_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            min_chars: 200,
            overlap_lines: 5,
        }
    }
}

/// Main configuration for the Mooring engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root; must be a git checkout.
    pub workspace: PathBuf,

    /// Organization the index belongs to.
    pub organization_id: String,

    /// Project within the organization.
    pub project_id: String,

    /// Bearer token for the index service. Encodes the service region.
    pub api_token: String,

    /// Directory for per-workspace cache files (host global storage).
    pub cache_dir: PathBuf,

    /// Explicit service base URL; when absent it is derived from the token.
    pub base_url: Option<String>,

    /// Chunking parameters.
    pub chunking: ChunkingConfig,

    /// Maximum chunks per upsert request.
    pub batch_size: usize,

    /// Maximum files chunked and uploaded concurrently.
    pub max_concurrent_files: usize,

    /// Watcher debounce window in milliseconds.
    pub debounce_ms: u64,

    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,

    /// Install the filesystem watcher after the initial scan.
    pub watch_enabled: bool,

    /// Override for the supported-extension allow-list.
    pub extensions: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            organization_id: String::new(),
            project_id: String::new(),
            api_token: String::new(),
            cache_dir: PathBuf::from("./.mooring"),
            base_url: None,
            chunking: ChunkingConfig::default(),
            batch_size: 60,
            max_concurrent_files: 10,
            debounce_ms: 500,
            http_timeout_secs: 30,
            watch_enabled: true,
            extensions: None,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.organization_id.is_empty() {
            return Err(Error::config("organization_id cannot be empty"));
        }

        if self.project_id.is_empty() {
            return Err(Error::config("project_id cannot be empty"));
        }

        if self.api_token.is_empty() {
            return Err(Error::config("api_token cannot be empty"));
        }

        if self.batch_size == 0 || self.batch_size > 60 {
            return Err(Error::config(
                "batch_size must be between 1 and 60 (service limit)",
            ));
        }

        if self.max_concurrent_files == 0 {
            return Err(Error::config("max_concurrent_files cannot be 0"));
        }

        if self.chunking.max_chars == 0 {
            return Err(Error::config("chunking.max_chars cannot be 0"));
        }

        if self.chunking.min_chars > self.chunking.max_chars {
            return Err(Error::config(
                "chunking.min_chars cannot exceed chunking.max_chars",
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(Error::config("http_timeout_secs cannot be 0"));
        }

        Ok(())
    }

    /// HTTP timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Debounce window as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The workspace as an absolute path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be canonicalized.
    pub fn workspace_abs(&self) -> Result<PathBuf> {
        Ok(self.workspace.canonicalize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            organization_id: "org-1".to_string(),
            project_id: "proj-1".to_string(),
            api_token: "mi_us_secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_chunking() {
        let chunking = ChunkingConfig::default();
        assert_eq!(chunking.max_chars, 1000);
        assert_eq!(chunking.min_chars, 200);
        assert_eq!(chunking.overlap_lines, 5);
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_org() {
        let config = Config {
            organization_id: String::new(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("organization_id"));
    }

    #[test]
    fn test_validate_missing_token() {
        let config = Config {
            api_token: String::new(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api_token"));
    }

    #[test]
    fn test_validate_batch_size_limit() {
        let config = Config {
            batch_size: 61,
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));

        let config = Config {
            batch_size: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_concurrency() {
        let config = Config {
            max_concurrent_files: 0,
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_files"));
    }

    #[test]
    fn test_validate_chunking_bounds() {
        let config = Config {
            chunking: ChunkingConfig {
                max_chars: 100,
                min_chars: 200,
                overlap_lines: 5,
            },
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_chars"));
    }

    #[test]
    fn test_durations() {
        let config = valid_config();
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }
}
