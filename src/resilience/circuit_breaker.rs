//! Circuit breaker whose state lives in the shared store.
//!
//! # States
//! - Closed: open marker absent, requests pass through
//! - Open: open marker present, requests fail fast
//! - Half-Open: open marker expired, recovery marker still present
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold within fail window (atomic, store-side)
//! Open → Half-Open: open marker TTL expires
//! Half-Open → Closed: a success clears every key, or the recovery window lapses
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - No local mutable state; every instance of the service sees the same breaker
//! - One store round trip per operation, no internal retries
//! - Write-path store errors are logged and swallowed
//! - Read-path store errors go through the fail-open / fail-closed policy

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::{BreakerSettings, HalfOpenMode, DEFAULT_FAILURE_THRESHOLD};
use crate::observability::metrics;
use crate::resilience::timeouts::{saturating_millis, with_deadline};
use crate::store::{
    Admission, BreakerKeys, FailureOutcome, FailurePolicy, SharedStore, StoreError, StoreResult,
};

/// Caller-visible breaker decline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerError {
    /// The protected operation was not attempted.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },
}

/// Validated, immutable breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub fail_window: Duration,
    pub open_cooldown: Duration,
    pub half_open_lease: Duration,
    pub fail_open: bool,
    pub key_prefix: String,
    pub half_open_mode: HalfOpenMode,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        let defaults = BreakerSettings::default();
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            fail_window: Duration::from_millis(defaults.fail_window_ms),
            open_cooldown: Duration::from_millis(defaults.open_cooldown_ms),
            half_open_lease: Duration::from_millis(defaults.half_open_lease_ms),
            fail_open: defaults.fail_open,
            key_prefix: defaults.key_prefix,
            half_open_mode: defaults.half_open_mode,
        }
    }
}

impl BreakerConfig {
    /// Build from file settings, substituting defaults for invalid values.
    pub fn from_settings(settings: &BreakerSettings) -> Self {
        let failure_threshold = if settings.failure_threshold <= 0 {
            0
        } else {
            u32::try_from(settings.failure_threshold).unwrap_or(u32::MAX)
        };

        Self {
            failure_threshold,
            fail_window: Duration::from_millis(settings.fail_window_ms),
            open_cooldown: Duration::from_millis(settings.open_cooldown_ms),
            half_open_lease: Duration::from_millis(settings.half_open_lease_ms),
            fail_open: settings.fail_open,
            key_prefix: settings.key_prefix.clone(),
            half_open_mode: settings.half_open_mode,
        }
        .normalized()
    }

    /// Replace zero thresholds, zero durations and an empty prefix with defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        if self.failure_threshold == 0 {
            warn!(
                default = defaults.failure_threshold,
                "Non-positive breaker failure_threshold, using default"
            );
            self.failure_threshold = defaults.failure_threshold;
        }
        if self.fail_window.is_zero() {
            warn!(default = ?defaults.fail_window, "Zero breaker fail_window, using default");
            self.fail_window = defaults.fail_window;
        }
        if self.open_cooldown.is_zero() {
            warn!(default = ?defaults.open_cooldown, "Zero breaker open_cooldown, using default");
            self.open_cooldown = defaults.open_cooldown;
        }
        if self.half_open_lease.is_zero() {
            warn!(default = ?defaults.half_open_lease, "Zero breaker half_open_lease, using default");
            self.half_open_lease = defaults.half_open_lease;
        }
        if self.key_prefix.is_empty() {
            self.key_prefix = defaults.key_prefix;
        }
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy {
            threshold: self.failure_threshold,
            fail_window: self.fail_window,
            open_cooldown: self.open_cooldown,
            half_open_lease: self.half_open_lease,
        }
    }
}

/// Externally observed breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of a breaker for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    /// Failures counted in the current window.
    pub failures: u64,
    pub failure_threshold: u32,
    /// Time until the open marker expires.
    pub open_remaining_ms: Option<u64>,
    pub probe_in_flight: bool,
    pub fail_open: bool,
}

/// Store-backed circuit breaker for one named protected operation.
pub struct Breaker {
    store: Arc<dyn SharedStore>,
    name: String,
    keys: BreakerKeys,
    config: BreakerConfig,
    policy: FailurePolicy,
}

impl Breaker {
    pub fn new(store: Arc<dyn SharedStore>, name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        let config = config.normalized();
        let keys = BreakerKeys::new(&config.key_prefix, &name);
        let policy = config.failure_policy();
        Self {
            store,
            name,
            keys,
            config,
            policy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn keys(&self) -> &BreakerKeys {
        &self.keys
    }

    /// Decide whether a call may proceed.
    ///
    /// Returns `CircuitOpen` when the breaker is tripped, or when the store is
    /// unreachable and the breaker fails closed.
    pub async fn allow(&self) -> Result<(), BreakerError> {
        let admission = self.admission().await;
        self.decide(admission)
    }

    /// `allow` bounded by a caller deadline.
    ///
    /// An elapsed deadline is a store timeout and goes through the
    /// fail-open / fail-closed policy like any other store error.
    pub async fn allow_within(&self, deadline: Duration) -> Result<(), BreakerError> {
        let admission = with_deadline(deadline, self.admission()).await;
        self.decide(admission)
    }

    async fn admission(&self) -> StoreResult<Admission> {
        match self.config.half_open_mode {
            HalfOpenMode::Implicit => self.store.get(&self.keys.open).await.map(|marker| {
                if marker.is_some() {
                    Admission::Open
                } else {
                    Admission::Closed
                }
            }),
            HalfOpenMode::SingleProbe => {
                self.store
                    .admit_probe(&self.keys, self.config.half_open_lease)
                    .await
            }
        }
    }

    fn decide(&self, admission: StoreResult<Admission>) -> Result<(), BreakerError> {
        match admission {
            Ok(Admission::Closed) => {
                metrics::record_decision(&self.name, true);
                Ok(())
            }
            Ok(Admission::Probe) => {
                debug!(breaker = %self.name, "Admitting half-open probe");
                metrics::record_decision(&self.name, true);
                Ok(())
            }
            Ok(Admission::Open) => {
                trace!(breaker = %self.name, "Circuit open, rejecting request");
                metrics::record_decision(&self.name, false);
                Err(self.open_error())
            }
            Err(err) => self.degraded(err),
        }
    }

    /// Record a successful call. Never fails.
    pub async fn on_success(&self) {
        if let Err(err) = self.clear().await {
            warn!(breaker = %self.name, error = %err, "Failed to clear breaker state after success");
            metrics::record_store_error(&self.name, "on_success");
        }
    }

    /// Record a failed call. Never fails.
    pub async fn on_failure(&self) {
        match self.store.record_failure(&self.keys, &self.policy).await {
            Ok(FailureOutcome::Counted(failures)) => {
                debug!(
                    breaker = %self.name,
                    failures,
                    threshold = self.config.failure_threshold,
                    "Failure recorded"
                );
            }
            Ok(FailureOutcome::Opened(failures)) => {
                warn!(
                    breaker = %self.name,
                    failures,
                    cooldown_ms = saturating_millis(self.config.open_cooldown),
                    "Circuit breaker opened"
                );
                metrics::record_transition(&self.name, "open");
            }
            Ok(FailureOutcome::Reopened) => {
                warn!(breaker = %self.name, "Failure while half-open, circuit breaker re-opened");
                metrics::record_transition(&self.name, "reopen");
            }
            Ok(FailureOutcome::AlreadyOpen) => {
                trace!(breaker = %self.name, "Failure recorded in open state (ignored)");
            }
            Err(err) => {
                warn!(breaker = %self.name, error = %err, "Failed to record breaker failure");
                metrics::record_store_error(&self.name, "on_failure");
            }
        }
    }

    /// Operator reset: clear all state, reporting store errors.
    pub async fn reset(&self) -> StoreResult<()> {
        self.clear().await?;
        tracing::info!(breaker = %self.name, "Circuit breaker reset");
        metrics::record_transition(&self.name, "closed");
        Ok(())
    }

    /// Operator trip: open the breaker for one cooldown regardless of failures.
    pub async fn trip(&self) -> StoreResult<()> {
        self.store
            .set(&self.keys.open, "1", self.config.open_cooldown)
            .await?;
        self.store
            .set(&self.keys.half, "1", self.policy.recovery_window())
            .await?;
        self.store
            .delete(&[self.keys.fails.clone(), self.keys.probe.clone()])
            .await?;

        warn!(breaker = %self.name, "Circuit breaker force-opened");
        metrics::record_transition(&self.name, "open");
        Ok(())
    }

    /// Read the breaker's current state from the store.
    pub async fn snapshot(&self) -> StoreResult<BreakerSnapshot> {
        let open = self.store.get(&self.keys.open).await?.is_some();
        let open_remaining_ms = if open {
            self.store
                .ttl(&self.keys.open)
                .await?
                .map(saturating_millis)
        } else {
            None
        };
        let half = self.store.get(&self.keys.half).await?.is_some();
        let probe_in_flight = self.store.get(&self.keys.probe).await?.is_some();

        let failures = match self.store.get(&self.keys.fails).await? {
            Some(raw) => raw.parse().map_err(|_| {
                StoreError::Protocol(format!("failure counter '{}' is not an integer", raw))
            })?,
            None => 0,
        };

        let state = if open {
            BreakerState::Open
        } else if half {
            BreakerState::HalfOpen
        } else {
            BreakerState::Closed
        };

        Ok(BreakerSnapshot {
            name: self.name.clone(),
            state,
            failures,
            failure_threshold: self.config.failure_threshold,
            open_remaining_ms,
            probe_in_flight,
            fail_open: self.config.fail_open,
        })
    }

    async fn clear(&self) -> StoreResult<()> {
        self.store.delete(&self.keys.all()).await
    }

    fn degraded(&self, err: StoreError) -> Result<(), BreakerError> {
        metrics::record_store_error(&self.name, "allow");
        metrics::record_degraded(&self.name, self.config.fail_open);

        if self.config.fail_open {
            warn!(
                breaker = %self.name,
                error = %err,
                "Breaker store unreachable, allowing request without breaker protection"
            );
            metrics::record_decision(&self.name, true);
            Ok(())
        } else {
            warn!(
                breaker = %self.name,
                error = %err,
                "Breaker store unreachable, rejecting request (fail closed)"
            );
            metrics::record_decision(&self.name, false);
            Err(self.open_error())
        }
    }

    fn open_error(&self) -> BreakerError {
        BreakerError::CircuitOpen {
            name: self.name.clone(),
        }
    }
}

impl std::fmt::Debug for Breaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
