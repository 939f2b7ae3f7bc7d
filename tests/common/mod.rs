//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleet_breaker::store::{
    Admission, BreakerKeys, FailureOutcome, FailurePolicy, SharedStore, StoreError, StoreResult,
};
use fleet_breaker::{Breaker, BreakerConfig, MemoryStore};

/// A store whose every call fails as if the network were down.
pub struct UnreachableStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".into()))
}

#[async_trait]
impl SharedStore for UnreachableStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        down()
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
        down()
    }
    async fn delete(&self, _keys: &[String]) -> StoreResult<()> {
        down()
    }
    async fn increment(&self, _key: &str) -> StoreResult<i64> {
        down()
    }
    async fn ttl(&self, _key: &str) -> StoreResult<Option<Duration>> {
        down()
    }
    async fn record_failure(
        &self,
        _keys: &BreakerKeys,
        _policy: &FailurePolicy,
    ) -> StoreResult<FailureOutcome> {
        down()
    }
    async fn admit_probe(&self, _keys: &BreakerKeys, _lease: Duration) -> StoreResult<Admission> {
        down()
    }
    async fn ping(&self) -> StoreResult<()> {
        down()
    }
}

/// A store whose calls never complete, like a blackholed connection.
pub struct HangingStore;

async fn hang<T>() -> StoreResult<T> {
    std::future::pending().await
}

#[async_trait]
impl SharedStore for HangingStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        hang().await
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
        hang().await
    }
    async fn delete(&self, _keys: &[String]) -> StoreResult<()> {
        hang().await
    }
    async fn increment(&self, _key: &str) -> StoreResult<i64> {
        hang().await
    }
    async fn ttl(&self, _key: &str) -> StoreResult<Option<Duration>> {
        hang().await
    }
    async fn record_failure(
        &self,
        _keys: &BreakerKeys,
        _policy: &FailurePolicy,
    ) -> StoreResult<FailureOutcome> {
        hang().await
    }
    async fn admit_probe(&self, _keys: &BreakerKeys, _lease: Duration) -> StoreResult<Admission> {
        hang().await
    }
    async fn ping(&self) -> StoreResult<()> {
        hang().await
    }
}

/// Memory store decorator that counts open transitions and can fail pings.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    opened: AtomicUsize,
    reopened: AtomicUsize,
    ping_down: AtomicBool,
    ping_hangs: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn reopened(&self) -> usize {
        self.reopened.load(Ordering::SeqCst)
    }

    pub fn set_ping_down(&self, down: bool) {
        self.ping_down.store(down, Ordering::SeqCst);
    }

    pub fn set_ping_hangs(&self, hangs: bool) {
        self.ping_hangs.store(hangs, Ordering::SeqCst);
    }
}

#[async_trait]
impl SharedStore for CountingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.inner.set(key, value, ttl).await
    }
    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        self.inner.delete(keys).await
    }
    async fn increment(&self, key: &str) -> StoreResult<i64> {
        self.inner.increment(key).await
    }
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.inner.ttl(key).await
    }
    async fn record_failure(
        &self,
        keys: &BreakerKeys,
        policy: &FailurePolicy,
    ) -> StoreResult<FailureOutcome> {
        let outcome = self.inner.record_failure(keys, policy).await?;
        match outcome {
            FailureOutcome::Opened(_) => {
                self.opened.fetch_add(1, Ordering::SeqCst);
            }
            FailureOutcome::Reopened => {
                self.reopened.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
        Ok(outcome)
    }
    async fn admit_probe(&self, keys: &BreakerKeys, lease: Duration) -> StoreResult<Admission> {
        self.inner.admit_probe(keys, lease).await
    }
    async fn ping(&self) -> StoreResult<()> {
        if self.ping_hangs.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if self.ping_down.load(Ordering::SeqCst) {
            return down();
        }
        self.inner.ping().await
    }
}

/// Breaker config with the given threshold; 10s window, 30s cooldown.
pub fn config(threshold: u32) -> BreakerConfig {
    BreakerConfig {
        failure_threshold: threshold,
        fail_window: Duration::from_secs(10),
        open_cooldown: Duration::from_secs(30),
        ..BreakerConfig::default()
    }
}

pub fn breaker(store: Arc<dyn SharedStore>, name: &str, config: BreakerConfig) -> Breaker {
    Breaker::new(store, name, config)
}
