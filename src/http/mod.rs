//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace / timeout / panic layers)
//!     → middleware.rs (per-route breaker: allow, then record outcome)
//!     → handler
//!     → error.rs (ApiError → status code + JSON body)
//!     → Send to client
//! ```

pub mod error;
pub mod middleware;
pub mod server;

pub use error::ApiError;
pub use middleware::breaker_middleware;
pub use server::{AppState, HttpServer};
