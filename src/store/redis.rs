//! Redis-backed shared store.
//!
//! # Responsibilities
//! - Hold a multiplexed, auto-reconnecting connection to Redis
//! - Bound every command by the configured command timeout
//! - Run the failure and probe transforms as server-side Lua scripts

use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Script};
use async_trait::async_trait;

use super::script::{ADMIT_PROBE, RECORD_FAILURE};
use super::{
    Admission, BreakerKeys, FailureOutcome, FailurePolicy, SharedStore, StoreError, StoreResult,
};
use crate::config::StoreConfig;
use crate::resilience::timeouts::{millis, with_deadline};

/// Shared store client for a Redis server reachable by every instance.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    command_timeout: Duration,
    failure_script: Script,
    probe_script: Script,
}

impl RedisStore {
    /// Connect using the `[store]` configuration.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let client = ::redis::Client::open(config.url.as_str())?;
        let command_timeout = config.command_timeout();
        let conn = with_deadline(command_timeout, ConnectionManager::new(client)).await?;

        tracing::info!(
            url = %config.url,
            command_timeout_ms = config.command_timeout_ms,
            "Connected to redis store"
        );
        Ok(Self::from_manager(conn, command_timeout))
    }

    /// Wrap an existing connection manager.
    pub fn from_manager(conn: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            conn,
            command_timeout,
            failure_script: Script::new(RECORD_FAILURE),
            probe_script: Script::new(ADMIT_PROBE),
        }
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        with_deadline(self.command_timeout, conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        with_deadline(
            self.command_timeout,
            ::redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(millis(ttl))
                .query_async(&mut conn),
        )
        .await
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        with_deadline(self.command_timeout, conn.del(keys)).await
    }

    async fn increment(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        with_deadline(self.command_timeout, conn.incr(key, 1i64)).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        let remaining_ms: i64 = with_deadline(self.command_timeout, conn.pttl(key)).await?;
        // -2: no such key, -1: no expiry
        Ok(u64::try_from(remaining_ms).ok().map(Duration::from_millis))
    }

    async fn record_failure(
        &self,
        keys: &BreakerKeys,
        policy: &FailurePolicy,
    ) -> StoreResult<FailureOutcome> {
        let mut conn = self.conn.clone();
        let mut invocation = self.failure_script.prepare_invoke();
        for key in keys.all() {
            invocation.key(key);
        }
        invocation
            .arg(millis(policy.fail_window))
            .arg(policy.threshold)
            .arg(millis(policy.open_cooldown))
            .arg(millis(policy.recovery_window()));

        let (count, outcome): (i64, String) =
            with_deadline(self.command_timeout, invocation.invoke_async(&mut conn)).await?;
        let count = u64::try_from(count).unwrap_or_default();

        match outcome.as_str() {
            "counted" => Ok(FailureOutcome::Counted(count)),
            "opened" => Ok(FailureOutcome::Opened(count)),
            "reopened" => Ok(FailureOutcome::Reopened),
            "already_open" => Ok(FailureOutcome::AlreadyOpen),
            other => Err(StoreError::Protocol(format!(
                "unknown failure outcome '{other}'"
            ))),
        }
    }

    async fn admit_probe(&self, keys: &BreakerKeys, lease: Duration) -> StoreResult<Admission> {
        let mut conn = self.conn.clone();
        let mut invocation = self.probe_script.prepare_invoke();
        for key in keys.all() {
            invocation.key(key);
        }
        invocation.arg(millis(lease));

        let decision: String =
            with_deadline(self.command_timeout, invocation.invoke_async(&mut conn)).await?;

        match decision.as_str() {
            "closed" => Ok(Admission::Closed),
            "open" => Ok(Admission::Open),
            "probe" => Ok(Admission::Probe),
            other => Err(StoreError::Protocol(format!(
                "unknown admission decision '{other}'"
            ))),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let reply: String =
            with_deadline(self.command_timeout, ::redis::cmd("PING").query_async(&mut conn)).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Protocol(format!("unexpected PING reply '{reply}'")))
        }
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}
