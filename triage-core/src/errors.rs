//! Crate-wide error hierarchy for triage-core.
//!
//! One root `Error` for all public functions, provider-aware HTTP status
//! mapping, ergonomic `?` via `From` impls — same shape as
//! `mr_reviewer::errors`, generalized from a single MR/PR provider facade to
//! a REST+GraphQL GitHub gateway.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type TriageResult<T> = Result<T, Error>;

/// Root error type for the triage-core crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Platform (REST/GraphQL) related failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Cache (file I/O / JSON) failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Configuration problems (missing token, bad cache dir, etc.).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input validation errors (bad duration spec, bad repo name, etc.).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Detailed provider-specific error used inside the gateway layer.
///
/// Mirrors spec.md §7's error taxonomy: `ErrRateLimited`/`ErrAuth` are
/// fatal to the calling phase, everything else is logged and the affected
/// item is left unenriched.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("server error: status {0}")]
    Server(u16),

    #[error("http status error: {0}")]
    HttpStatus(u16),

    #[error("timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// GraphQL `errors` array was non-empty but `data` still had usable
    /// blocks. Logged, never fatal (spec.md §4.3, §7).
    #[error("graphql returned {0} error(s) alongside partial data")]
    GraphQlPartial(usize),
}

/// File cache related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Configuration/setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    #[error("invalid cache directory: {0}")]
    InvalidCacheDir(String),

    #[error("invalid config file: {0}")]
    InvalidFormat(String),
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(ProviderError::from(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Cache(CacheError::Io(e))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => ProviderError::Unauthorized,
                403 => ProviderError::Forbidden,
                404 => ProviderError::NotFound,
                429 => ProviderError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => ProviderError::Server(code),
                _ => ProviderError::HttpStatus(code),
            };
        }
        ProviderError::Network(e.to_string())
    }
}

impl Error {
    /// True for the two kinds spec.md §7 calls fatal-to-phase
    /// (`ErrRateLimited`) or fatal-to-run (`ErrAuth`).
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Error::Provider(ProviderError::RateLimited { .. })
        )
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Provider(ProviderError::Unauthorized))
    }
}
