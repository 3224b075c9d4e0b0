//! Shared test doubles for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apifetch::cache::{CacheStore, MemoryCacheStore};
use apifetch::client::{
    ApiClient, HttpTransport, Method, RequestOptions, TransportError, TransportResponse,
};
use apifetch::clock::FixedClock;
use apifetch::environment::StaticEnvironment;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

/// Transport answering from a queue of scripted outcomes
///
/// When the queue is empty every request fails with a connect error.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(TransportResponse {
            status: 200,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Makes every request wait before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn request(
        &self,
        _method: Method,
        url: &str,
        _options: &RequestOptions,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(connect_error(url)))
    }
}

pub fn connect_error(url: &str) -> TransportError {
    TransportError::Connect {
        url: url.to_string(),
        message: "connection refused".to_string(),
    }
}

pub fn client_error(url: &str) -> TransportError {
    TransportError::Client {
        status: 404,
        url: url.to_string(),
    }
}

/// The reference time `T` used by the tests
pub fn t() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryCacheStore>,
    pub clock: Arc<FixedClock>,
    pub client: ApiClient,
}

/// Builds a client over a mock transport, an in-memory store and a clock at `T`
pub fn harness(environment: &str) -> Harness {
    let transport = MockTransport::new();
    let store = Arc::new(MemoryCacheStore::new());
    let clock = Arc::new(FixedClock::new(t()));
    let client = ApiClient::new(
        transport.clone(),
        store.clone() as Arc<dyn CacheStore>,
        Arc::new(StaticEnvironment::new(environment)),
    )
    .with_clock(clock.clone());

    Harness {
        transport,
        store,
        clock,
        client,
    }
}
