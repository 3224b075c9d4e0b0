//! Typed request options
//!
//! Options come from three places: the defaults a client is built with, the
//! caller of a single request, and overrides derived from the active
//! environment. `merge` combines the first two; `environment_overrides`
//! computes the third and is applied last.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::environment::LOCAL_ENVIRONMENT;

/// Options for a single HTTP request
///
/// Scalar options are `None` when unset so a merge can tell "not given"
/// apart from an explicit value. List options accumulate across merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Enable TCP keep-alive on the connection (default: on)
    pub tcp_keepalive: Option<bool>,
    /// Verify TLS certificates (default: on)
    pub verify: Option<bool>,
    /// Total request timeout in milliseconds; `0` means no timeout
    pub timeout_ms: Option<u64>,
    /// Connection timeout in milliseconds; `0` means no timeout
    pub connect_timeout_ms: Option<u64>,
    /// Request headers, sent in order
    pub headers: Vec<(String, String)>,
    /// Query string parameters, sent in order
    pub query: Vec<(String, String)>,
    /// JSON request body
    pub json: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = Some(verify);
        self
    }

    /// Sets the total request timeout, rounded up to whole milliseconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(whole_millis(timeout));
        self
    }

    /// Sets the connection timeout, rounded up to whole milliseconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(whole_millis(timeout));
        self
    }

    /// Whether TCP keep-alive is enabled once defaults are applied
    pub fn keepalive_enabled(&self) -> bool {
        self.tcp_keepalive.unwrap_or(true)
    }

    /// Whether TLS certificates are verified once defaults are applied
    pub fn verify_enabled(&self) -> bool {
        self.verify.unwrap_or(true)
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        non_zero_millis(self.timeout_ms)
    }

    pub fn connect_timeout_duration(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }
}

/// Converts a duration to milliseconds without truncating sub-millisecond parts
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

fn non_zero_millis(millis: Option<u64>) -> Option<Duration> {
    millis.filter(|ms| *ms > 0).map(Duration::from_millis)
}

/// Combines caller options with defaults
///
/// A scalar set by the caller wins over the default. Lists are concatenated:
/// the caller's entries first, then the defaults.
pub fn merge(caller: &RequestOptions, defaults: &RequestOptions) -> RequestOptions {
    RequestOptions {
        tcp_keepalive: caller.tcp_keepalive.or(defaults.tcp_keepalive),
        verify: caller.verify.or(defaults.verify),
        timeout_ms: caller.timeout_ms.or(defaults.timeout_ms),
        connect_timeout_ms: caller.connect_timeout_ms.or(defaults.connect_timeout_ms),
        headers: caller
            .headers
            .iter()
            .chain(defaults.headers.iter())
            .cloned()
            .collect(),
        query: caller.query.iter().chain(defaults.query.iter()).cloned().collect(),
        json: caller.json.clone().or_else(|| defaults.json.clone()),
    }
}

/// Options forced by the active environment, applied after merging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvironmentOverrides {
    pub verify: Option<bool>,
}

impl EnvironmentOverrides {
    pub fn apply(&self, mut options: RequestOptions) -> RequestOptions {
        if let Some(verify) = self.verify {
            options.verify = Some(verify);
        }
        options
    }
}

/// Computes the overrides for an environment
///
/// The local environment talks to services with self-signed certificates,
/// so TLS verification is turned off there.
pub fn environment_overrides(environment: &str) -> EnvironmentOverrides {
    if environment == LOCAL_ENVIRONMENT {
        EnvironmentOverrides {
            verify: Some(false),
        }
    } else {
        EnvironmentOverrides::default()
    }
}
