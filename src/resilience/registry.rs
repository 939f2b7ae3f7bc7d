//! Per-process breaker registry.
//!
//! # Responsibilities
//! - Hand out exactly one `Breaker` per operation name
//! - Apply per-name configuration overrides at construction
//!
//! # Design Decisions
//! - Owned and injected at composition time; there is no global registry
//! - Fast path is a shared read; the slow path takes one shard's write lock,
//!   so construction happens at most once per name
//! - Entries are never removed while the process runs

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::{BreakerOverride, BreakerSettings, ServiceConfig};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{Breaker, BreakerConfig};
use crate::store::SharedStore;

pub struct BreakerRegistry {
    store: Arc<dyn SharedStore>,
    defaults: BreakerSettings,
    overrides: HashMap<String, BreakerOverride>,
    breakers: DashMap<String, Arc<Breaker>>,
}

impl BreakerRegistry {
    pub fn new(store: Arc<dyn SharedStore>, defaults: BreakerSettings) -> Self {
        Self {
            store,
            defaults,
            overrides: HashMap::new(),
            breakers: DashMap::new(),
        }
    }

    pub fn from_config(store: Arc<dyn SharedStore>, config: &ServiceConfig) -> Self {
        Self::new(store, config.breaker.clone()).with_overrides(config.breakers.clone())
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, BreakerOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Effective configuration for `name`: defaults plus any override.
    pub fn config_for(&self, name: &str) -> BreakerConfig {
        match self.overrides.get(name) {
            Some(over) => BreakerConfig::from_settings(&over.apply(&self.defaults)),
            None => BreakerConfig::from_settings(&self.defaults),
        }
    }

    /// Return the breaker for `name`, building it with `factory` on first use.
    ///
    /// Concurrent first callers race on the entry lock; the factory runs once.
    pub fn get_or_create<F>(&self, name: &str, factory: F) -> Arc<Breaker>
    where
        F: FnOnce(&str) -> Breaker,
    {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }

        let mut created = false;
        let breaker = {
            let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
                created = true;
                Arc::new(factory(name))
            });
            Arc::clone(entry.value())
        };

        // shard lock released above; len() reads every shard
        if created {
            tracing::debug!(breaker = %name, "Circuit breaker created");
            metrics::record_registry_size(self.breakers.len());
        }
        breaker
    }

    /// Return the breaker for `name`, built from configuration on first use.
    pub fn get(&self, name: &str) -> Arc<Breaker> {
        self.get_or_create(name, |name| {
            Breaker::new(Arc::clone(&self.store), name, self.config_for(name))
        })
    }

    /// Return the breaker for `name` only if this process has built it.
    pub fn existing(&self, name: &str) -> Option<Arc<Breaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Names of every constructed breaker, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("defaults", &self.defaults)
            .field("breakers", &self.names())
            .finish()
    }
}
