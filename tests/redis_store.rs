//! Tests against a live Redis server.
//!
//! Run with `REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fleet_breaker::config::{HalfOpenMode, StoreConfig};
use fleet_breaker::store::{Admission, BreakerKeys, FailureOutcome, FailurePolicy};
use fleet_breaker::{Breaker, BreakerConfig, RedisStore, SharedStore};

async fn connect() -> RedisStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let config = StoreConfig {
        url,
        ..StoreConfig::default()
    };
    RedisStore::connect(&config).await.expect("redis reachable")
}

/// Prefix unique to one test run so parallel runs do not collide.
fn unique_prefix(test: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("cbtest:{}:{}:{}:", std::process::id(), nanos, test)
}

fn policy(threshold: u32) -> FailurePolicy {
    FailurePolicy {
        threshold,
        fail_window: Duration::from_secs(10),
        open_cooldown: Duration::from_secs(30),
        half_open_lease: Duration::from_secs(5),
    }
}

#[tokio::test]
#[ignore]
async fn test_primitives() {
    let store = connect().await;
    let key = format!("{}k", unique_prefix("primitives"));

    assert_eq!(store.get(&key).await.unwrap(), None);
    assert_eq!(store.increment(&key).await.unwrap(), 1);
    assert_eq!(store.increment(&key).await.unwrap(), 2);
    assert_eq!(store.ttl(&key).await.unwrap(), None);

    store.set(&key, "v", Duration::from_secs(60)).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v"));
    let ttl = store.ttl(&key).await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(50));

    store.delete(&[key.clone()]).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), None);
    store.ping().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_failure_script_transitions() {
    let store = connect().await;
    let keys = BreakerKeys::new(&unique_prefix("script"), "svc");
    let policy = policy(3);

    assert_eq!(
        store.record_failure(&keys, &policy).await.unwrap(),
        FailureOutcome::Counted(1)
    );
    let window = store.ttl(&keys.fails).await.unwrap().unwrap();
    assert!(window <= Duration::from_secs(10));

    assert_eq!(
        store.record_failure(&keys, &policy).await.unwrap(),
        FailureOutcome::Counted(2)
    );
    assert_eq!(
        store.record_failure(&keys, &policy).await.unwrap(),
        FailureOutcome::Opened(3)
    );
    assert_eq!(store.get(&keys.fails).await.unwrap(), None);
    assert!(store.get(&keys.open).await.unwrap().is_some());
    assert_eq!(
        store.record_failure(&keys, &policy).await.unwrap(),
        FailureOutcome::AlreadyOpen
    );

    // simulate cooldown expiry: recovery marker remains, open marker gone
    store.delete(&[keys.open.clone()]).await.unwrap();
    assert_eq!(
        store.record_failure(&keys, &policy).await.unwrap(),
        FailureOutcome::Reopened
    );

    store.delete(&keys.all()).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_probe_script_grants_single_lease() {
    let store = connect().await;
    let keys = BreakerKeys::new(&unique_prefix("probe"), "svc");
    let lease = Duration::from_secs(5);

    assert_eq!(store.admit_probe(&keys, lease).await.unwrap(), Admission::Closed);

    store.set(&keys.half, "1", Duration::from_secs(30)).await.unwrap();
    assert_eq!(store.admit_probe(&keys, lease).await.unwrap(), Admission::Probe);
    assert_eq!(store.admit_probe(&keys, lease).await.unwrap(), Admission::Open);

    store.delete(&keys.all()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn test_concurrent_failures_open_once() {
    let store: Arc<dyn SharedStore> = Arc::new(connect().await);
    let config = BreakerConfig {
        failure_threshold: 5,
        key_prefix: unique_prefix("race"),
        half_open_mode: HalfOpenMode::Implicit,
        ..BreakerConfig::default()
    };
    let breaker = Arc::new(Breaker::new(Arc::clone(&store), "svc", config));
    let policy = breaker.config().failure_policy();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let store = Arc::clone(&store);
        let keys = breaker.keys().clone();
        handles.push(tokio::spawn(async move {
            store.record_failure(&keys, &policy).await.unwrap()
        }));
    }

    let mut opened = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), FailureOutcome::Opened(_)) {
            opened += 1;
        }
    }

    assert_eq!(opened, 1);
    assert_eq!(store.get(&breaker.keys().fails).await.unwrap(), None);
    assert!(breaker.allow().await.is_err());

    breaker.reset().await.unwrap();
    assert!(breaker.allow().await.is_ok());
}
