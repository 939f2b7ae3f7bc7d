//! In-process shared store.
//!
//! Mirrors the Redis semantics (TTL expiry, atomic transforms) for a single
//! process. Expiry is checked lazily against `tokio::time::Instant`, so tests
//! can drive it with a paused clock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{
    Admission, BreakerKeys, FailureOutcome, FailurePolicy, SharedStore, StoreError, StoreResult,
};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Map of live keys; every trait call holds the lock for its whole duration.
#[derive(Default)]
struct Entries {
    map: HashMap<String, Entry>,
}

impl Entries {
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        if self.map.get(key).is_some_and(|e| !e.is_live(now)) {
            self.map.remove(key);
        }
        self.map.get_mut(key)
    }

    fn exists(&mut self, key: &str, now: Instant) -> bool {
        self.live(key, now).is_some()
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration, now: Instant) {
        self.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
    }

    fn increment(&mut self, key: &str, now: Instant) -> StoreResult<i64> {
        match self.live(key, now) {
            Some(entry) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    StoreError::Protocol(format!("value at '{key}' is not an integer"))
                })?;
                let next = current + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                self.map.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    fn remove(&mut self, key: &str) {
        self.map.remove(key);
    }
}

/// Shared store held entirely in this process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().expect("memory store mutex poisoned");
        entries.map.values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("memory store mutex poisoned");
        Ok(entries.live(key, now).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("memory store mutex poisoned");
        entries.set(key, value, ttl, now);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        let mut entries = self.entries.lock().expect("memory store mutex poisoned");
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn increment(&self, key: &str) -> StoreResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("memory store mutex poisoned");
        entries.increment(key, now)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("memory store mutex poisoned");
        Ok(entries
            .live(key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn record_failure(
        &self,
        keys: &BreakerKeys,
        policy: &FailurePolicy,
    ) -> StoreResult<FailureOutcome> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("memory store mutex poisoned");

        if entries.exists(&keys.open, now) {
            return Ok(FailureOutcome::AlreadyOpen);
        }

        if entries.exists(&keys.half, now) {
            entries.set(&keys.open, "1", policy.open_cooldown, now);
            entries.set(&keys.half, "1", policy.recovery_window(), now);
            entries.remove(&keys.fails);
            entries.remove(&keys.probe);
            return Ok(FailureOutcome::Reopened);
        }

        let fails = entries.increment(&keys.fails, now)?;
        if let Some(entry) = entries.live(&keys.fails, now) {
            if entry.expires_at.is_none() {
                entry.expires_at = Some(now + policy.fail_window);
            }
        }
        let fails = u64::try_from(fails).unwrap_or_default();

        if fails >= u64::from(policy.threshold) {
            entries.set(&keys.open, "1", policy.open_cooldown, now);
            entries.set(&keys.half, "1", policy.recovery_window(), now);
            entries.remove(&keys.fails);
            entries.remove(&keys.probe);
            return Ok(FailureOutcome::Opened(fails));
        }

        entries.remove(&keys.probe);
        Ok(FailureOutcome::Counted(fails))
    }

    async fn admit_probe(&self, keys: &BreakerKeys, lease: Duration) -> StoreResult<Admission> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("memory store mutex poisoned");

        if entries.exists(&keys.open, now) {
            return Ok(Admission::Open);
        }
        if !entries.exists(&keys.half, now) {
            return Ok(Admission::Closed);
        }
        if entries.exists(&keys.probe, now) {
            return Ok(Admission::Open);
        }
        entries.set(&keys.probe, "1", lease, now);
        Ok(Admission::Probe)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u32) -> FailurePolicy {
        FailurePolicy {
            threshold,
            fail_window: Duration::from_secs(10),
            open_cooldown: Duration::from_secs(30),
            half_open_lease: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_expires() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_and_ttl() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("n").await.unwrap(), 1);
        assert_eq!(store.increment("n").await.unwrap(), 2);
        // increment alone never sets an expiry
        assert_eq!(store.ttl("n").await.unwrap(), None);
        assert_eq!(store.ttl("missing").await.unwrap(), None);

        store.set("t", "x", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.ttl("t").await.unwrap(), Some(Duration::from_secs(6)));
    }

    #[tokio::test]
    async fn test_increment_rejects_non_integer() {
        let store = MemoryStore::new();
        store.set("k", "abc", Duration::from_secs(5)).await.unwrap();
        assert!(matches!(
            store.increment("k").await,
            Err(StoreError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryStore::new();
        store
            .delete(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_failure_trips_at_threshold() {
        let store = MemoryStore::new();
        let keys = BreakerKeys::new("cb:", "op");
        let policy = policy(3);

        assert_eq!(
            store.record_failure(&keys, &policy).await.unwrap(),
            FailureOutcome::Counted(1)
        );
        assert_eq!(
            store.ttl(&keys.fails).await.unwrap(),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            store.record_failure(&keys, &policy).await.unwrap(),
            FailureOutcome::Counted(2)
        );
        assert_eq!(
            store.record_failure(&keys, &policy).await.unwrap(),
            FailureOutcome::Opened(3)
        );

        assert_eq!(store.get(&keys.fails).await.unwrap(), None);
        assert_eq!(
            store.ttl(&keys.open).await.unwrap(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            store.ttl(&keys.half).await.unwrap(),
            Some(Duration::from_secs(35))
        );
        assert_eq!(
            store.record_failure(&keys, &policy).await.unwrap(),
            FailureOutcome::AlreadyOpen
        );
        assert_eq!(store.get(&keys.fails).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_window_expiry_restarts_count() {
        let store = MemoryStore::new();
        let keys = BreakerKeys::new("cb:", "op");
        let policy = policy(3);

        store.record_failure(&keys, &policy).await.unwrap();
        store.record_failure(&keys, &policy).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(
            store.record_failure(&keys, &policy).await.unwrap(),
            FailureOutcome::Counted(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_in_recovery_window_reopens() {
        let store = MemoryStore::new();
        let keys = BreakerKeys::new("cb:", "op");
        let policy = policy(1);

        store.record_failure(&keys, &policy).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get(&keys.open).await.unwrap(), None);

        assert_eq!(
            store.record_failure(&keys, &policy).await.unwrap(),
            FailureOutcome::Reopened
        );
        assert!(store.get(&keys.open).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_probe_grants_single_lease() {
        let store = MemoryStore::new();
        let keys = BreakerKeys::new("cb:", "op");
        let policy = policy(1);
        let lease = Duration::from_secs(5);

        assert_eq!(
            store.admit_probe(&keys, lease).await.unwrap(),
            Admission::Closed
        );

        store.record_failure(&keys, &policy).await.unwrap();
        assert_eq!(store.admit_probe(&keys, lease).await.unwrap(), Admission::Open);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(
            store.admit_probe(&keys, lease).await.unwrap(),
            Admission::Probe
        );
        assert_eq!(store.admit_probe(&keys, lease).await.unwrap(), Admission::Open);
    }
}
