//! Shared state store subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker (resilience/circuit_breaker.rs)
//!     → SharedStore trait (this module)
//!     → redis.rs  (fleet-wide: Redis + Lua scripts)
//!     → memory.rs (single process: mutex-guarded map)
//! ```
//!
//! # Key Layout
//! ```text
//! {prefix}{name}          → open marker      (TTL = open cooldown)
//! {prefix}{name}:fails    → failure counter  (TTL = fail window)
//! {prefix}{name}:half     → recovery window  (TTL = cooldown + half-open lease)
//! {prefix}{name}:probe    → probe lease      (TTL = half-open lease)
//! ```
//!
//! # Design Decisions
//! - The store is the only shared mutable state; nothing here locks it
//! - Multi-step transitions go through a narrow atomic transform
//!   (`record_failure`, `admit_probe`), never read-then-write sequences
//! - One attempt per call; retry policy belongs to the caller

pub mod memory;
pub mod redis;
mod script;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors talking to the shared store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport or server error from Redis.
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The command did not complete within the configured deadline.
    #[error("store command timed out after {0:?}")]
    Timeout(Duration),

    /// The store cannot be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store replied with something we did not expect.
    #[error("unexpected store reply: {0}")]
    Protocol(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The set of keys backing one named breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerKeys {
    pub open: String,
    pub fails: String,
    pub half: String,
    pub probe: String,
}

impl BreakerKeys {
    pub fn new(prefix: &str, name: &str) -> Self {
        let open = format!("{prefix}{name}");
        Self {
            fails: format!("{open}:fails"),
            half: format!("{open}:half"),
            probe: format!("{open}:probe"),
            open,
        }
    }

    /// All keys, in the order the scripts expect them.
    pub fn all(&self) -> [String; 4] {
        [
            self.fails.clone(),
            self.open.clone(),
            self.half.clone(),
            self.probe.clone(),
        ]
    }
}

/// Parameters for the atomic failure transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    pub threshold: u32,
    pub fail_window: Duration,
    pub open_cooldown: Duration,
    /// How long the recovery window outlives the open marker.
    pub half_open_lease: Duration,
}

impl FailurePolicy {
    /// TTL of the recovery marker set when the breaker trips.
    pub fn recovery_window(&self) -> Duration {
        self.open_cooldown + self.half_open_lease
    }
}

/// What `record_failure` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Counter incremented; still below threshold.
    Counted(u64),
    /// Threshold crossed; open marker created and counter reset.
    Opened(u64),
    /// Failure during the recovery window; breaker re-opened.
    Reopened,
    /// Open marker already present; nothing changed.
    AlreadyOpen,
}

/// Admission decision for single-probe half-open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Closed,
    Open,
    /// This caller holds the fleet-wide probe lease.
    Probe,
}

/// Minimal capability set the breaker needs from a shared key-value store.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Create or overwrite `key` with an expiry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Delete keys; missing keys are not an error.
    async fn delete(&self, keys: &[String]) -> StoreResult<()>;

    /// Increment an integer key, creating it at 1 if absent.
    async fn increment(&self, key: &str) -> StoreResult<i64>;

    /// Remaining time to live; `None` if the key is absent or never expires.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Atomically count a failure and trip the breaker at threshold.
    async fn record_failure(
        &self,
        keys: &BreakerKeys,
        policy: &FailurePolicy,
    ) -> StoreResult<FailureOutcome>;

    /// Atomically decide admission, granting at most one probe per lease.
    async fn admit_probe(&self, keys: &BreakerKeys, lease: Duration) -> StoreResult<Admission>;

    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = BreakerKeys::new("cb:", "GET /status");
        assert_eq!(keys.open, "cb:GET /status");
        assert_eq!(keys.fails, "cb:GET /status:fails");
        assert_eq!(keys.half, "cb:GET /status:half");
        assert_eq!(keys.probe, "cb:GET /status:probe");
    }

    #[test]
    fn test_recovery_window() {
        let policy = FailurePolicy {
            threshold: 5,
            fail_window: Duration::from_secs(10),
            open_cooldown: Duration::from_secs(30),
            half_open_lease: Duration::from_secs(5),
        };
        assert_eq!(policy.recovery_window(), Duration::from_secs(35));
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "store command timed out after 250ms");
    }
}
