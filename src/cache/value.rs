//! Cached payloads with expiry and invalidation tags

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::client::ApiResponse;

/// A cached API payload
///
/// `expire` of `None` means the value never expires on its own; the store
/// may still evict it. Tags are opaque to this crate and are handed to the
/// store untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheValue {
    data: ApiResponse,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    expire: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl CacheValue {
    /// Creates a value expiring at the given instant
    pub fn new<I, S>(data: ApiResponse, expire: Option<DateTime<Utc>>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data,
            expire,
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a value that never expires and carries no tags
    pub fn permanent(data: ApiResponse) -> Self {
        Self {
            data,
            expire: None,
            tags: BTreeSet::new(),
        }
    }

    /// Creates a value that expires `ttl` after `now`
    pub fn expiring_in<I, S>(data: ApiResponse, now: DateTime<Utc>, ttl: Duration, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(data, Some(now + ttl), tags)
    }

    /// Returns true once `now` has reached the expiry timestamp
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expire {
            Some(expire) => now >= expire,
            None => false,
        }
    }

    pub fn data(&self) -> &ApiResponse {
        &self.data
    }

    pub fn expire(&self) -> Option<DateTime<Utc>> {
        self.expire
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn into_data(self) -> ApiResponse {
        self.data
    }
}
