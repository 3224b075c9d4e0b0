//! Command-line interface parsing for apifetch
//!
//! This module handles parsing of CLI arguments using clap and turns them,
//! together with the optional config file, into a `RunConfig` and an
//! `ApiClient` ready to fetch.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::cache::{cache_key, CacheStore, FileCacheStore, MemoryCacheStore};
use crate::client::{
    ApiClient, ApiResponse, CachePolicy, Method, ReqwestTransport, RequestOptions,
};
use crate::config::{ClientConfig, ConfigError};
use crate::environment::{EnvVarEnvironment, EnvironmentResolver, StaticEnvironment};
use crate::error::ApiError;

/// Prefix of cache keys when `--cache-key` is not given
const DEFAULT_KEY_PREFIX: &str = "apifetch";

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The HTTP method is not a valid token
    #[error("Invalid HTTP method: '{0}'")]
    InvalidMethod(String),

    /// A header is not in `Name: value` form
    #[error("Invalid header: '{0}'. Expected 'Name: value'")]
    InvalidHeader(String),

    /// The config file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// apifetch - fetch JSON APIs with caching, stale fallback and local fixtures
#[derive(Parser, Debug)]
#[command(name = "apifetch")]
#[command(about = "Fetch JSON APIs with caching, stale fallback and local fixtures")]
#[command(version)]
pub struct Cli {
    /// URLs to fetch in order; all share one client, so after the first failure the rest fail fast
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header in `Name: value` form (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Prefix for cache keys; each URL is cached under `<prefix>:<method>:<url>`
    #[arg(long, value_name = "PREFIX")]
    pub cache_key: Option<String>,

    /// Seconds until cached responses expire (default: from config, else never)
    #[arg(long, value_name = "SECONDS")]
    pub ttl: Option<u64>,

    /// Invalidation tag stored with cached responses (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Always re-fetch, even when a fresh cached response exists
    #[arg(long)]
    pub bypass_cache: bool,

    /// Do not read or write the cache at all
    #[arg(long, conflicts_with = "bypass_cache")]
    pub no_cache: bool,

    /// File served instead of a failed response in the local environment
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Active environment name
    #[arg(long, env = "APP_ENV")]
    pub environment: Option<String>,

    /// Directory for the disk cache
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Path to a YAML config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Everything needed to run a fetch, after combining CLI and config file
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub method: Method,
    pub urls: Vec<String>,
    /// Per-request options from the command line
    pub options: RequestOptions,
    /// Client-wide defaults from the config file
    pub default_options: RequestOptions,
    pub environment: Option<String>,
    /// `None` disables caching
    pub cache: Option<CacheSettings>,
    pub fixture: Option<PathBuf>,
}

/// Cache behaviour for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub key_prefix: String,
    pub dir: Option<PathBuf>,
    pub policy: CachePolicy,
    pub bypass: bool,
}

impl CacheSettings {
    /// Cache key for a request
    pub fn key_for(&self, method: &Method, url: &str) -> String {
        cache_key(&self.key_prefix, [method.as_str(), url])
    }
}

/// Parses an HTTP method argument
///
/// # Returns
/// * `Ok(Method)` for any valid method token, case-insensitive
/// * `Err(CliError::InvalidMethod)` otherwise
pub fn parse_method_arg(s: &str) -> Result<Method, CliError> {
    Method::from_bytes(s.to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::InvalidMethod(s.to_string()))
}

/// Parses a `Name: value` header argument
pub fn parse_header_arg(s: &str) -> Result<(String, String), CliError> {
    match s.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(CliError::InvalidHeader(s.to_string())),
    }
}

impl RunConfig {
    /// Creates a RunConfig from parsed CLI arguments
    ///
    /// Loads the config file given with `--config`; command-line values win
    /// over values from the file.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let file = match &cli.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        Self::from_parts(cli, file)
    }

    /// Combines CLI arguments with an already loaded config
    pub fn from_parts(cli: &Cli, file: ClientConfig) -> Result<Self, CliError> {
        let method = parse_method_arg(&cli.method)?;

        let mut options = RequestOptions::new();
        for header in &cli.headers {
            let (name, value) = parse_header_arg(header)?;
            options = options.header(name, value);
        }

        let cache = if cli.no_cache {
            None
        } else {
            let ttl_secs = cli.ttl.or(file.default_ttl_secs);
            let mut policy = CachePolicy::new(ttl_secs.map(|secs| Duration::seconds(secs as i64)));
            policy.tags = cli.tags.clone();
            Some(CacheSettings {
                key_prefix: cli
                    .cache_key
                    .clone()
                    .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
                dir: cli.cache_dir.clone().or(file.cache_dir),
                policy,
                bypass: cli.bypass_cache,
            })
        };

        Ok(Self {
            method,
            urls: cli.urls.clone(),
            options,
            default_options: file.default_options,
            environment: cli.environment.clone().or(file.environment),
            cache,
            fixture: cli.fixture.clone(),
        })
    }

    /// Builds the client for this run
    ///
    /// Uses a disk cache when caching is enabled and a cache directory can be
    /// determined, an in-memory cache otherwise.
    pub fn build_client(&self) -> ApiClient {
        let environment: Arc<dyn EnvironmentResolver> = match &self.environment {
            Some(name) => Arc::new(StaticEnvironment::new(name.clone())),
            None => Arc::new(EnvVarEnvironment::default()),
        };

        let store: Arc<dyn CacheStore> = match &self.cache {
            Some(CacheSettings { dir: Some(dir), .. }) => Arc::new(FileCacheStore::with_dir(dir)),
            Some(_) => match FileCacheStore::new() {
                Some(store) => Arc::new(store),
                None => Arc::new(MemoryCacheStore::new()),
            },
            None => Arc::new(MemoryCacheStore::new()),
        };

        let client = ApiClient::new(Arc::new(ReqwestTransport::new()), store, environment)
            .with_default_options(self.default_options.clone());

        match &self.cache {
            Some(settings) if settings.bypass => client.with_bypass_cache(),
            _ => client,
        }
    }

    /// Fetches one URL, through the cache unless caching is disabled
    pub async fn fetch(&self, client: &ApiClient, url: &str) -> Result<ApiResponse, ApiError> {
        let fixture = self.fixture.as_deref();
        match &self.cache {
            Some(cache) => {
                let key = cache.key_for(&self.method, url);
                let value = client
                    .fetch_cached(&key, self.method.clone(), url, &self.options, fixture, &cache.policy)
                    .await?;
                Ok(value.into_data())
            }
            None => {
                client
                    .make_request(self.method.clone(), url, &self.options, fixture)
                    .await
            }
        }
    }

    /// Fetches every URL in order, one at a time
    ///
    /// Each request starts after the previous one finished, so a failure
    /// trips the client's short-circuit before the next URL is tried.
    pub async fn fetch_all(&self, client: &ApiClient) -> Vec<Result<ApiResponse, ApiError>> {
        stream::iter(&self.urls)
            .then(|url| self.fetch(client, url))
            .collect()
            .await
    }
}
