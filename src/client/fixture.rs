//! Local fixture loading
//!
//! Fixtures stand in for API responses when requests fail in the local
//! environment. JSON is the default format; files ending in `.yml` or
//! `.yaml` are read as YAML.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use super::response::{ApiResponse, DecodeError};

/// Errors that can occur when loading a fixture
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The fixture file does not exist
    #[error("Fixture not found: {0}")]
    NotFound(PathBuf),

    /// The fixture file could not be read
    #[error("Failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The fixture content is not a valid payload
    #[error("Malformed fixture {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// Reads a fixture file into an `ApiResponse`
pub fn load(path: &Path) -> Result<ApiResponse, FixtureError> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            FixtureError::NotFound(path.to_path_buf())
        } else {
            FixtureError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let malformed = |message: String| FixtureError::Malformed {
        path: path.to_path_buf(),
        message,
    };

    let data: Value = if is_yaml(path) {
        serde_yaml::from_str(&content).map_err(|e| malformed(e.to_string()))?
    } else {
        serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?
    };

    ApiResponse::new(data).map_err(|e: DecodeError| malformed(e.to_string()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}
