//! Fleet-wide circuit breakers backed by a shared store.

pub mod admin;
pub mod config;
pub mod http;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use resilience::{Breaker, BreakerConfig, BreakerError, BreakerRegistry, Gate};
pub use store::{MemoryStore, RedisStore, SharedStore, StoreError};
