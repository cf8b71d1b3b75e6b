//! Application layer error types

use crate::domain::DomainError;
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Vulnerability lookup error: {0}")]
    Vulnerability(#[from] VulnerabilityError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classified error for outbound vulnerability-database requests.
///
/// Every variant carries enough provider context (status, method, url) for
/// diagnostics, and classification is exposed through `kind`,
/// `is_retryable`, and `is_recoverable`.
#[derive(Error, Debug)]
pub enum VulnerabilityError {
    #[error("network error for {method} {url}: {message}")]
    Network {
        method: String,
        url: String,
        message: String,
    },

    #[error("timeout after {seconds}s for {method} {url}")]
    Timeout {
        seconds: u64,
        method: String,
        url: String,
    },

    #[error("rate limited (HTTP {status}) by {url}")]
    RateLimit { status: u16, url: String },

    #[error("authentication failed (HTTP {status}) for {url}: {message}")]
    Auth {
        status: u16,
        url: String,
        message: String,
    },

    #[error("HTTP {status} from {method} {url}: {message}")]
    Http {
        status: u16,
        method: String,
        url: String,
        message: String,
    },

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl VulnerabilityError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            VulnerabilityError::Network { .. } => "network",
            VulnerabilityError::Timeout { .. } => "timeout",
            VulnerabilityError::RateLimit { .. } => "rate_limit",
            VulnerabilityError::Auth { .. } => "auth",
            VulnerabilityError::Http { .. } => "api",
            VulnerabilityError::Json(_) => "decode",
            VulnerabilityError::InvalidResponse { .. } => "invalid_response",
        }
    }

    /// Whether another attempt of the same request may succeed:
    /// timeouts, connection failures, 429 and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            VulnerabilityError::Network { .. } => true,
            VulnerabilityError::Timeout { .. } => true,
            VulnerabilityError::RateLimit { .. } => true,
            VulnerabilityError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the session can continue issuing requests to this provider.
    /// Auth failures and rate limiting mean further requests are pointless.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            VulnerabilityError::Auth { .. } | VulnerabilityError::RateLimit { .. }
        )
    }

    /// Whether this error signals provider-side rate limiting: a bare 429, or
    /// an auth rejection whose message carries a rate-limit hint.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            VulnerabilityError::RateLimit { .. } => true,
            VulnerabilityError::Auth { message, .. } => {
                message.to_lowercase().contains("rate limit")
            }
            _ => false,
        }
    }

    /// Provider HTTP status, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            VulnerabilityError::RateLimit { status, .. }
            | VulnerabilityError::Auth { status, .. }
            | VulnerabilityError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Cache-layer errors. These are always absorbed by callers and degrade to
/// a cache miss, never a failure of the in-memory result path.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt cache entry: {message}")]
    Corrupt { message: String },

    #[error("compression failed: {message}")]
    Compression { message: String },
}
