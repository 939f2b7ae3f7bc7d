//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → breaker settings handed to the registry at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; breakers never re-read it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerOverride, BreakerSettings, HalfOpenMode, LogFormat, ObservabilityConfig,
    ServerConfig, ServiceConfig, StoreBackend, StoreConfig, DEFAULT_FAILURE_THRESHOLD,
};
pub use validation::ValidationError;
