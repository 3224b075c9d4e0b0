//! API client with caching, stale fallback and local fixtures
//!
//! `ApiClient` performs requests through an `HttpTransport`, decodes JSON
//! bodies into `ApiResponse` values and wraps fetches in a cache policy that
//! prefers stale data over failure.

mod base;
pub mod fixture;
pub mod options;
mod response;
mod transport;

pub use base::{ApiClient, CachePolicy};
pub use fixture::FixtureError;
pub use options::RequestOptions;
pub use response::{ApiResponse, DecodeError};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};

pub use reqwest::Method;
