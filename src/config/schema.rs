//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Shared state store connection.
    pub store: StoreConfig,

    /// Default breaker settings applied to every operation name.
    pub breaker: BreakerSettings,

    /// Per-operation overrides, keyed by operation name.
    pub breakers: HashMap<String, BreakerOverride>,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Which store implementation backs the breakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Redis shared by every instance of the service.
    #[default]
    Redis,
    /// Process-local store; breakers are not shared.
    Memory,
}

/// Shared store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Redis connection URL.
    pub url: String,

    /// Deadline for a single store command in milliseconds.
    pub command_timeout_ms: u64,
}

impl StoreConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            url: "redis://127.0.0.1:6379".to_string(),
            command_timeout_ms: 2000,
        }
    }
}

/// How a breaker behaves once its open cooldown has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalfOpenMode {
    /// Every caller is admitted; the first failure re-opens.
    #[default]
    Implicit,
    /// One caller fleet-wide holds a probe lease; the rest are rejected.
    SingleProbe,
}

/// Failures within the window that trip a breaker unless configured.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Breaker settings as written in the config file.
///
/// Non-positive values are not rejected here; they are replaced with
/// defaults when a `BreakerConfig` is built.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Failures within the window that trip the breaker.
    pub failure_threshold: i64,

    /// Rolling window over which failures are counted, in milliseconds.
    pub fail_window_ms: u64,

    /// How long the breaker stays open, in milliseconds.
    pub open_cooldown_ms: u64,

    /// Length of the half-open window and probe lease, in milliseconds.
    pub half_open_lease_ms: u64,

    /// Allow traffic when the store is unreachable.
    pub fail_open: bool,

    /// Prefix for every store key.
    pub key_prefix: String,

    pub half_open_mode: HalfOpenMode,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: i64::from(DEFAULT_FAILURE_THRESHOLD),
            fail_window_ms: 10_000,
            open_cooldown_ms: 30_000,
            half_open_lease_ms: 5_000,
            fail_open: true,
            key_prefix: "cb:".to_string(),
            half_open_mode: HalfOpenMode::Implicit,
        }
    }
}

/// Partial breaker settings for one operation name.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BreakerOverride {
    pub failure_threshold: Option<i64>,
    pub fail_window_ms: Option<u64>,
    pub open_cooldown_ms: Option<u64>,
    pub half_open_lease_ms: Option<u64>,
    pub fail_open: Option<bool>,
    pub key_prefix: Option<String>,
    pub half_open_mode: Option<HalfOpenMode>,
}

impl BreakerOverride {
    /// Layer this override on top of `base`.
    pub fn apply(&self, base: &BreakerSettings) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            fail_window_ms: self.fail_window_ms.unwrap_or(base.fail_window_ms),
            open_cooldown_ms: self.open_cooldown_ms.unwrap_or(base.open_cooldown_ms),
            half_open_lease_ms: self.half_open_lease_ms.unwrap_or(base.half_open_lease_ms),
            fail_open: self.fail_open.unwrap_or(base.fail_open),
            key_prefix: self
                .key_prefix
                .clone()
                .unwrap_or_else(|| base.key_prefix.clone()),
            half_open_mode: self.half_open_mode.unwrap_or(base.half_open_mode),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}
