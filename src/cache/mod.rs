//! Cache module for storing API payloads
//!
//! Cached values carry an expiry timestamp and invalidation tags. Stores
//! return expired values as-is; deciding whether an expired value is still
//! usable is left to the client, which serves stale data when the upstream
//! API cannot be reached.

mod key;
mod manager;
mod store;
mod value;

pub use key::cache_key;
pub use manager::FileCacheStore;
pub use store::{CacheError, CacheStore, MemoryCacheStore, StoredEntry};
pub use value::CacheValue;
