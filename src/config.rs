//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub apis: ApiConfig,
    pub logging: LoggingConfig,
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Attempts per logical request, including the first
    pub retries: u32,
}

/// Persistent cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub directory: PathBuf,
    pub ttl_minutes: u64,
    /// Entries above this many serialized bytes are gzip-compressed
    pub compression_threshold_bytes: usize,
    /// Treat cached critical/high findings as a miss so they are re-fetched
    pub refresh_high_severity: bool,
}

/// External API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub osv: OsvConfig,
    pub ghsa: GhsaConfig,
}

/// Bulk vulnerability database (OSV) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsvConfig {
    pub base_url: String,
}

/// Advisory REST API (GitHub Security Advisories) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhsaConfig {
    pub base_url: String,
    /// Opaque bearer token attached to outbound requests when present
    pub token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                timeout_seconds: 30,
                retries: 3,
            },
            cache: CacheConfig {
                directory: PathBuf::from(".depsentry_cache"),
                ttl_minutes: 60,
                compression_threshold_bytes: 10 * 1024,
                refresh_high_severity: true,
            },
            apis: ApiConfig {
                osv: OsvConfig {
                    base_url: "https://api.osv.dev".to_string(),
                },
                ghsa: GhsaConfig {
                    base_url: "https://api.github.com".to_string(),
                    token: None,
                },
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Config::default())?;

        config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("DEPSENTRY").separator("__"))
            .build()?
            .try_deserialize()
    }
}
