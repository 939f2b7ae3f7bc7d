//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call:
//!     → gate.rs (resolve breaker by name, sequence the calls below)
//!     → registry.rs (one Breaker per operation name, per process)
//!     → circuit_breaker.rs (allow / on_success / on_failure against the store)
//!     → timeouts.rs (every store command has a deadline)
//! ```
//!
//! # Design Decisions
//! - Breakers hold no local state; the shared store is the source of truth
//! - No retries or backoff here; a denied or failed call is the caller's to handle
//! - Store unavailability is a policy decision (fail open / fail closed), not an error type

pub mod circuit_breaker;
pub mod gate;
pub mod registry;
pub mod timeouts;

pub use circuit_breaker::{Breaker, BreakerConfig, BreakerError, BreakerSnapshot, BreakerState};
pub use gate::Gate;
pub use registry::BreakerRegistry;
