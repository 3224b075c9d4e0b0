//! apifetch library
//!
//! A base for clients of remote JSON APIs: requests go through an
//! `HttpTransport`, successful responses can be cached with an expiry and
//! invalidation tags, and failures degrade to stale cache or, in the local
//! environment, to fixture files.

pub mod cache;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod environment;
pub mod error;

pub use error::ApiError;
