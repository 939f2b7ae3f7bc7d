//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, registry, HTTP layer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Every breaker event carries the breaker name as a field
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
