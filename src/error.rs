//! Error type returned by the API client

use thiserror::Error;

use crate::client::{DecodeError, FixtureError, TransportError};

/// Errors surfaced by `ApiClient`
///
/// Only `Transport` errors are eligible for fixture or stale cache
/// fallback; everything else reaches the caller unchanged.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body is not a valid payload
    #[error("Failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    /// A fixture was selected but could not be loaded
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    /// Nothing is cached and no fresh value could be fetched
    #[error("No cached value available for '{key}'")]
    CacheUnavailable { key: String },
}

impl ApiError {
    /// The underlying transport error, if this is one
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(error) => Some(error),
            _ => None,
        }
    }
}
