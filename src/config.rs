// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the Education Code MCP server.
//!
//! Values are layered: serde defaults, then an optional config file, then
//! `EDCODE__SECTION__FIELD` environment variables, then the flat variables
//! `CACHE_TTL`, `GLOBAL_RATE_LIMIT`, `SECTION_RATE_LIMIT`,
//! `RATE_LIMIT_WINDOW`, `BIND_ADDR` and `MCP_TRANSPORT`.

use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How MCP messages arrive (default: http)
    #[serde(default)]
    pub transport: Transport,

    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Section cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Upstream legislature website configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// MCP transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Streaming HTTP endpoint at `/sse`
    #[default]
    Http,
    /// Newline-delimited JSON-RPC on stdin and stdout
    Stdio,
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window per client (default: 1000)
    #[serde(default = "default_global_limit")]
    pub global_limit: u32,

    /// Maximum requests per window per client and section (default: 10)
    #[serde(default = "default_section_limit")]
    pub section_limit: u32,

    /// Window length in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Section cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live of a cached section in seconds (default: 86400)
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// Where and how sections are fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Section display page of the legislature website
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Law code queried (default: EDC)
    #[serde(default = "default_law_code")]
    pub law_code: String,

    /// User-Agent sent with every fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upper bound on a single fetch in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_global_limit() -> u32 {
    1000
}

fn default_section_limit() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    86400 // 24 hours
}

fn default_base_url() -> String {
    "https://leginfo.legislature.ca.gov/faces/codes_displaySection.xhtml".to_string()
}

fn default_law_code() -> String {
    "EDC".to_string()
}

fn default_user_agent() -> String {
    concat!("Mozilla/5.0 (compatible; CA-Ed-Code-MCP/", env!("CARGO_PKG_VERSION"), ")").to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            upstream: UpstreamConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_limit: default_global_limit(),
            section_limit: default_section_limit(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            law_code: default_law_code(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from `CONFIG_FILE` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "ca-ed-code-mcp".to_string());

        config::Config::builder()
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix("EDCODE")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("transport", std::env::var("MCP_TRANSPORT").ok())?
            .set_override_option("bind_addr", std::env::var("BIND_ADDR").ok())?
            .set_override_option("cache.ttl_secs", std::env::var("CACHE_TTL").ok())?
            .set_override_option("rate_limit.global_limit", std::env::var("GLOBAL_RATE_LIMIT").ok())?
            .set_override_option("rate_limit.section_limit", std::env::var("SECTION_RATE_LIMIT").ok())?
            .set_override_option("rate_limit.window_secs", std::env::var("RATE_LIMIT_WINDOW").ok())?
            .build()?
            .try_deserialize()
    }
}

impl RateLimitConfig {
    /// Get the rate window duration, never zero
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_ms().unsigned_abs())
    }

    /// Window length in milliseconds, never zero, saturating at `i64::MAX`.
    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window_secs.max(1))
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }
}

impl CacheConfig {
    /// Get the cache TTL duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl UpstreamConfig {
    /// Get the fetch timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
