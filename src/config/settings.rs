//! Runtime settings
//!
//! Settings read from the environment (and an optional `.env` file): logging,
//! timeouts, request limits and the reasoning cache lifetime

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment-driven settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Upstream request configuration
    pub request: RequestConfig,
    /// Reasoning cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Upstream request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Maximum request size in bytes
    pub max_request_size: usize,
    /// Timeout for non-streaming calls in seconds
    pub timeout: u64,
    /// Timeout for streaming calls in seconds
    pub stream_timeout: u64,
}

/// Reasoning cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    pub ttl_secs: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text/json)
    pub format: String,
}

impl Settings {
    /// Create a new configuration instance
    pub fn new() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let settings = Self {
            request: RequestConfig {
                max_request_size: get_env_or_default("MAX_REQUEST_SIZE", "10485760")
                    .parse()
                    .context("Invalid maximum request size")?,
                timeout: get_env_or_default("REQUEST_TIMEOUT", "30")
                    .parse()
                    .context("Invalid request timeout")?,
                stream_timeout: get_env_or_default("STREAM_TIMEOUT", "300")
                    .parse()
                    .context("Invalid stream timeout")?,
            },
            cache: CacheConfig {
                ttl_secs: get_env_or_default("REASONING_CACHE_TTL_SECS", "3600")
                    .parse()
                    .context("Invalid reasoning cache TTL")?,
            },
            logging: LoggingConfig {
                level: get_env_or_default("RUST_LOG", "info"),
                format: get_env_or_default("LOG_FORMAT", "text"),
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        if self.request.timeout == 0 || self.request.stream_timeout == 0 {
            anyhow::bail!("Timeout values cannot be 0");
        }

        if self.request.max_request_size == 0 {
            anyhow::bail!("Maximum request size cannot be 0");
        }

        if self.cache.ttl_secs <= 0 {
            anyhow::bail!("Reasoning cache TTL must be positive");
        }

        // RUST_LOG may carry directives like "reasoning_relay=debug"
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !self.logging.level.contains('=')
            && !valid_levels.contains(&self.logging.level.as_str())
        {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }

    /// Reasoning cache lifetime
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache.ttl_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request: RequestConfig {
                max_request_size: 10 * 1024 * 1024,
                timeout: 30,
                stream_timeout: 300,
            },
            cache: CacheConfig { ttl_secs: 3600 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

/// Get environment variable or default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
