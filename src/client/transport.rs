//! HTTP transport abstraction and its reqwest implementation
//!
//! Transport failures are classified the way fallbacks need them: client
//! (4xx) and connection errors can be replaced by fixtures in the local
//! environment, every transport error can be replaced by stale cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use thiserror::Error;

use super::options::RequestOptions;

/// Keep-alive interval used when TCP keep-alive is enabled
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Errors raised by an HTTP transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a 4xx status
    #[error("Client error {status} for {url}")]
    Client { status: u16, url: String },

    /// The server answered with a 5xx status
    #[error("Server error {status} for {url}")]
    Server { status: u16, url: String },

    /// The server could not be reached
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// Any other transfer failure
    #[error("Request to {url} failed: {message}")]
    Other { url: String, message: String },
}

impl TransportError {
    /// A transfer error carrying no details about a specific request
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Other {
            url: String::new(),
            message: message.into(),
        }
    }

    /// Whether a local fixture may stand in for the failed request
    pub fn allows_fixture(&self) -> bool {
        matches!(self, Self::Client { .. } | Self::Connect { .. })
    }

    /// The URL of the failed request
    pub fn url(&self) -> &str {
        match self {
            Self::Client { url, .. }
            | Self::Server { url, .. }
            | Self::Connect { url, .. }
            | Self::Other { url, .. } => url,
        }
    }
}

/// A successful HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Performs HTTP requests
///
/// Implementations are shared between client instances and must be safe for
/// concurrent use. Non-2xx responses are reported as errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<TransportResponse, TransportError>;
}

/// Connection-level settings that need a dedicated `reqwest::Client`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClientKey {
    verify: bool,
    keepalive: bool,
    connect_timeout: Option<Duration>,
}

impl ClientKey {
    fn from_options(options: &RequestOptions) -> Self {
        Self {
            verify: options.verify_enabled(),
            keepalive: options.keepalive_enabled(),
            connect_timeout: options.connect_timeout_duration(),
        }
    }
}

/// Transport backed by `reqwest`
///
/// TLS verification, keep-alive and connect timeouts are properties of a
/// `reqwest::Client`, so one client is built and reused per distinct
/// combination of those options.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<ClientKey, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, url: &str, options: &RequestOptions) -> Result<Client, TransportError> {
        let key = ClientKey::from_options(options);
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| TransportError::generic("HTTP client pool lock poisoned"))?;

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .tcp_keepalive(key.keepalive.then_some(TCP_KEEPALIVE_INTERVAL))
            .danger_accept_invalid_certs(!key.verify);
        if let Some(timeout) = key.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build().map_err(|e| TransportError::Other {
            url: url.to_string(),
            message: format!("Failed to build HTTP client: {}", e),
        })?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(url, options)?;

        let mut request = client.request(method, url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.json {
            request = request.json(body);
        }
        if let Some(timeout) = options.timeout_duration() {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| classify(url, e))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(TransportError::Client {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        if status.is_server_error() {
            return Err(TransportError::Server {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(TransportError::Other {
                url: url.to_string(),
                message: format!("Unexpected status {}", status),
            });
        }

        let body = response.bytes().await.map_err(|e| classify(url, e))?;
        Ok(TransportResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

/// Maps a reqwest failure onto the transport taxonomy
fn classify(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        TransportError::Other {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
