//! Request execution and cache orchestration
//!
//! An `ApiClient` is meant to live for one logical operation (e.g. serving
//! one incoming request). After its first transport failure every later
//! request on the same instance fails immediately with that first error, so
//! a dead upstream costs one timeout per operation instead of one per call.

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use tracing::{debug, error, warn};

use super::fixture;
use super::options::{environment_overrides, merge, RequestOptions};
use super::response::ApiResponse;
use super::transport::{HttpTransport, TransportError};
use crate::cache::{CacheStore, CacheValue};
use crate::clock::{Clock, SystemClock};
use crate::environment::EnvironmentResolver;
use crate::error::ApiError;

/// How `fetch_cached` stores a fetched response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Time until the value expires; `None` never expires
    pub ttl: Option<Duration>,
    /// Invalidation tags stored with the value
    pub tags: Vec<String>,
}

impl CachePolicy {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            tags: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Base client for JSON APIs
///
/// Collaborators are shared between instances; the bypass flag and the
/// short-circuit latch belong to a single instance.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    environment: Arc<dyn EnvironmentResolver>,
    default_options: RequestOptions,
    bypass_cache: bool,
    /// First transport failure seen by this instance, never cleared
    previous_error: OnceLock<TransportError>,
}

impl ApiClient {
    /// Creates a client using the system clock and no default options
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn CacheStore>,
        environment: Arc<dyn EnvironmentResolver>,
    ) -> Self {
        Self {
            transport,
            cache,
            clock: Arc::new(SystemClock),
            environment,
            default_options: RequestOptions::default(),
            bypass_cache: false,
            previous_error: OnceLock::new(),
        }
    }

    /// Replaces the clock used for expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets options merged into every request
    pub fn with_default_options(mut self, options: RequestOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Returns a copy of this client that always re-fetches in `cache`
    ///
    /// The original instance is left untouched. The copy starts with the
    /// original's short-circuit state but tracks failures on its own.
    pub fn with_bypass_cache(&self) -> Self {
        let mut instance = self.duplicate(self.previous_error.clone());
        instance.bypass_cache = true;
        instance
    }

    /// Returns a copy with the same settings and a clear short-circuit latch
    ///
    /// Use one scoped instance per unrelated operation so an earlier failure
    /// does not disable later calls.
    pub fn scoped(&self) -> Self {
        self.duplicate(OnceLock::new())
    }

    fn duplicate(&self, previous_error: OnceLock<TransportError>) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            cache: Arc::clone(&self.cache),
            clock: Arc::clone(&self.clock),
            environment: Arc::clone(&self.environment),
            default_options: self.default_options.clone(),
            bypass_cache: self.bypass_cache,
            previous_error,
        }
    }

    pub fn bypasses_cache(&self) -> bool {
        self.bypass_cache
    }

    /// The failure that short-circuits further requests, if any
    pub fn short_circuit_error(&self) -> Option<&TransportError> {
        self.previous_error.get()
    }

    /// Current time according to the client's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Builds the effective options for a request
    ///
    /// Caller options are merged over the client defaults, which in turn
    /// sit over the built-in defaults (TCP keep-alive on). Environment
    /// overrides are applied last.
    pub fn request_options(&self, environment: &str, options: &RequestOptions) -> RequestOptions {
        let builtin = RequestOptions {
            tcp_keepalive: Some(true),
            ..RequestOptions::default()
        };
        let defaults = merge(&self.default_options, &builtin);
        environment_overrides(environment).apply(merge(options, &defaults))
    }

    /// Performs a request and decodes its JSON body
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `url` - Absolute URL of the endpoint
    /// * `options` - Per-request options, merged with the client defaults
    /// * `fixture` - File served instead of a failed response in the local environment
    ///
    /// # Behavior
    /// - Fails immediately with the stored error if an earlier request on this instance failed
    /// - On a client or connection error in the local environment, returns the fixture if given
    /// - Decoding failures are returned as `ApiError::Decode` and never fall back
    pub async fn make_request(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
        fixture: Option<&Path>,
    ) -> Result<ApiResponse, ApiError> {
        let environment = self.environment.active_environment_name();
        let options = self.request_options(&environment, options);

        let result = match self.previous_error.get() {
            Some(previous) => Err(previous.clone()),
            None => self.transport.request(method, url, &options).await,
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let _ = self.previous_error.set(err.clone());

                if let Some(fixture) = fixture {
                    if err.allows_fixture() && self.environment.is_local() {
                        warn!(
                            url,
                            fixture = %fixture.display(),
                            "Request failed: {}. Mock data is used instead.",
                            err
                        );
                        return Ok(fixture::load(fixture)?);
                    }
                }

                error!(url, "Request failed with error: {}", err);
                return Err(err.into());
            }
        };

        Ok(ApiResponse::from_slice(&response.body)?)
    }

    /// Returns the value cached under `key`, re-fetching it when needed
    ///
    /// The callback runs when nothing is cached, the cached value has
    /// expired, or this instance bypasses the cache. A successful fetch is
    /// stored and returned. When the fetch fails with a transport error and
    /// an older value exists, the older value is returned instead.
    pub async fn cache<F, Fut>(&self, key: &str, callback: F) -> Result<CacheValue, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue, ApiError>>,
    {
        let existing = self.cache.get(key).map(|entry| entry.data);

        let refetch = match &existing {
            Some(value) => self.bypass_cache || value.has_expired(self.now()),
            None => true,
        };

        let mut failure = None;
        if refetch {
            match callback().await {
                Ok(value) => {
                    if let Err(e) = self.cache.set(key, &value, value.tags()) {
                        warn!(key, error = %e, "Failed to store cache entry");
                    }
                    return Ok(value);
                }
                Err(ApiError::Transport(err)) => failure = Some(err),
                Err(err) => return Err(err),
            }
        } else {
            debug!(key, "Serving cached value");
        }

        match (existing, failure) {
            (Some(value), Some(err)) => {
                warn!(key, "Serving stale cache after failed refresh: {}", err);
                Ok(value)
            }
            (Some(value), None) => Ok(value),
            (None, Some(err)) => Err(err.into()),
            (None, None) => Err(ApiError::CacheUnavailable {
                key: key.to_string(),
            }),
        }
    }

    /// Fetches a URL through the cache
    ///
    /// Combines `cache` and `make_request`: the response is stored under
    /// `key` with the expiry and tags from `policy`.
    pub async fn fetch_cached(
        &self,
        key: &str,
        method: Method,
        url: &str,
        options: &RequestOptions,
        fixture: Option<&Path>,
        policy: &CachePolicy,
    ) -> Result<CacheValue, ApiError> {
        self.cache(key, || async move {
            let response = self.make_request(method, url, options, fixture).await?;
            let expire = policy.ttl.map(|ttl| self.now() + ttl);
            Ok(CacheValue::new(response, expire, policy.tags.iter().cloned()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::client::TransportResponse;
    use crate::environment::StaticEnvironment;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport that records the options it saw and answers from a script
    struct ScriptedTransport {
        outcome: Result<TransportResponse, TransportError>,
        calls: AtomicUsize,
        seen: Mutex<Vec<RequestOptions>>,
    }

    impl ScriptedTransport {
        fn ok(body: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(TransportResponse {
                    status: 200,
                    body: body.as_bytes().to_vec(),
                }),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: TransportError) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(err),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn request(
            &self,
            _method: Method,
            _url: &str,
            options: &RequestOptions,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(options.clone());
            self.outcome.clone()
        }
    }

    fn client(transport: Arc<ScriptedTransport>, environment: &str) -> ApiClient {
        ApiClient::new(
            transport,
            Arc::new(MemoryCacheStore::new()),
            Arc::new(StaticEnvironment::new(environment)),
        )
    }

    fn connect_error() -> TransportError {
        TransportError::Connect {
            url: "https://api.test/first".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[tokio::test]
    async fn test_make_request_decodes_json_body() {
        let transport = ScriptedTransport::ok(r#"{"items": [1, 2]}"#);
        let client = client(transport.clone(), "prod");

        let response = client
            .make_request(Method::GET, "https://api.test/items", &RequestOptions::new(), None)
            .await
            .expect("Request should succeed");

        assert_eq!(response.data(), &json!({"items": [1, 2]}));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_make_request_malformed_body_is_decode_error() {
        let client = client(ScriptedTransport::ok("not json"), "prod");

        let result = client
            .make_request(Method::GET, "https://api.test/items", &RequestOptions::new(), None)
            .await;

        assert!(matches!(result, Err(ApiError::Decode(_))));
        assert!(client.short_circuit_error().is_none());
    }

    #[tokio::test]
    async fn test_local_environment_disables_tls_verification() {
        let transport = ScriptedTransport::ok("{}");
        let client = client(transport.clone(), "local");

        client
            .make_request(Method::GET, "https://api.test", &RequestOptions::new().verify(true), None)
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].verify, Some(false));
        assert_eq!(seen[0].tcp_keepalive, Some(true));
    }

    #[tokio::test]
    async fn test_default_options_are_merged_into_requests() {
        let transport = ScriptedTransport::ok("{}");
        let client = client(transport.clone(), "prod")
            .with_default_options(RequestOptions::new().header("User-Agent", "apifetch"));

        client
            .make_request(
                Method::GET,
                "https://api.test",
                &RequestOptions::new().header("Accept", "application/json"),
                None,
            )
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        let names: Vec<&str> = seen[0].headers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Accept", "User-Agent"]);
        assert!(seen[0].verify_enabled());
    }

    #[tokio::test]
    async fn test_failure_short_circuits_later_requests() {
        let transport = ScriptedTransport::failing(connect_error());
        let client = client(transport.clone(), "prod");

        let first = client
            .make_request(Method::GET, "https://api.test/first", &RequestOptions::new(), None)
            .await;
        let second = client
            .make_request(Method::GET, "https://api.test/second", &RequestOptions::new(), None)
            .await;

        assert!(first.is_err());
        // The second call reports the first call's error without touching the network
        let err = second.unwrap_err();
        assert_eq!(err.as_transport(), Some(&connect_error()));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scoped_instance_starts_with_clear_latch() {
        let transport = ScriptedTransport::failing(connect_error());
        let client = client(transport.clone(), "prod");
        let _ = client
            .make_request(Method::GET, "https://api.test/first", &RequestOptions::new(), None)
            .await;

        let scoped = client.scoped();
        assert!(scoped.short_circuit_error().is_none());
        let _ = scoped
            .make_request(Method::GET, "https://api.test/again", &RequestOptions::new(), None)
            .await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_server_error_never_uses_fixture() {
        let transport = ScriptedTransport::failing(TransportError::Server {
            status: 502,
            url: "https://api.test".to_string(),
        });
        let client = client(transport, "local");

        let result = client
            .make_request(
                Method::GET,
                "https://api.test",
                &RequestOptions::new(),
                Some(Path::new("does-not-matter.json")),
            )
            .await;

        assert!(matches!(
            result,
            Err(ApiError::Transport(TransportError::Server { status: 502, .. }))
        ));
    }

    #[test]
    fn test_with_bypass_cache_leaves_original_untouched() {
        let client = client(ScriptedTransport::ok("{}"), "prod");
        let bypassing = client.with_bypass_cache();

        assert!(bypassing.bypasses_cache());
        assert!(!client.bypasses_cache());
        assert!(bypassing.scoped().bypasses_cache());
    }

    #[test]
    fn test_cache_policy_builder_collects_tags() {
        let policy = CachePolicy::new(Some(Duration::minutes(5)))
            .tag("events")
            .tag("fi");
        assert_eq!(policy.tags, vec!["events".to_string(), "fi".to_string()]);
        assert_eq!(policy.ttl, Some(Duration::minutes(5)));
    }
}
