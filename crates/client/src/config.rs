//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `STORE_BACKEND_URL` - Base URL of the remote store service. When unset
//!   the client starts disconnected and browses an empty catalog.
//! - `STORE_IDENTITY` - Principal to log in as
//! - `STORE_ADMIN_TOKEN` - Secret for the one-time admin claim
//! - `STORE_CACHE_MAX_CAPACITY` - Max cached query results (default: 1000)
//! - `STORE_CACHE_TTL_SECS` - Freshness bound for cached results (default: 300)
//! - `STORE_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN (CLI only)

use std::time::Duration;

use machinery_store_core::Principal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_CACHE_MAX_CAPACITY: u64 = 1000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Store client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote service base URL
    pub backend_url: Option<Url>,
    /// Identity to log in as
    pub identity: Option<Principal>,
    /// Admin claim secret
    pub admin_token: Option<SecretString>,
    /// Domain cache sizing
    pub cache: CacheConfig,
    /// Per-request timeout for the HTTP backend
    pub request_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Domain cache sizing and freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub time_to_live: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_CACHE_MAX_CAPACITY,
            time_to_live: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            identity: None,
            admin_token: None,
            cache: CacheConfig::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            sentry_dsn: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend_url = get("STORE_BACKEND_URL")
            .map(|raw| {
                Url::parse(raw.trim()).map_err(|e| {
                    ConfigError::InvalidEnvVar("STORE_BACKEND_URL".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let identity = get("STORE_IDENTITY")
            .map(|raw| {
                Principal::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("STORE_IDENTITY".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let admin_token = get("STORE_ADMIN_TOKEN").map(SecretString::from);

        let max_capacity = parse_u64(
            "STORE_CACHE_MAX_CAPACITY",
            get("STORE_CACHE_MAX_CAPACITY"),
            DEFAULT_CACHE_MAX_CAPACITY,
        )?;
        let ttl_secs = parse_u64(
            "STORE_CACHE_TTL_SECS",
            get("STORE_CACHE_TTL_SECS"),
            DEFAULT_CACHE_TTL_SECS,
        )?;
        let timeout_secs = parse_u64(
            "STORE_REQUEST_TIMEOUT_SECS",
            get("STORE_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        Ok(Self {
            backend_url,
            identity,
            admin_token,
            cache: CacheConfig {
                max_capacity,
                time_to_live: Duration::from_secs(ttl_secs),
            },
            request_timeout: Duration::from_secs(timeout_secs),
            sentry_dsn: get("SENTRY_DSN"),
        })
    }
}

/// Parse an optional unsigned integer variable, falling back to `default`.
fn parse_u64(key: &str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    value.map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
