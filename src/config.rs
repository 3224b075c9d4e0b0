//! Client configuration file
//!
//! An optional YAML file supplying defaults the command line does not set:
//!
//! ```yaml
//! environment: local
//! cache_dir: /tmp/apifetch
//! default_ttl_secs: 3600
//! default_options:
//!   timeout_ms: 15000
//!   headers:
//!     - [Accept, application/json]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::client::RequestOptions;

/// Errors that can occur when loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Settings for building an `ApiClient`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Environment name; when unset it is read from `APP_ENV`
    pub environment: Option<String>,
    /// Directory for the disk cache; defaults to the XDG cache directory
    pub cache_dir: Option<PathBuf>,
    /// Lifetime of cached responses in seconds; unset means no expiry
    pub default_ttl_secs: Option<u64>,
    /// Options merged into every request
    pub default_options: RequestOptions,
}

impl ClientConfig {
    /// Loads the configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
