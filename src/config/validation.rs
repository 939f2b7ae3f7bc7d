//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and store connection settings
//! - Reject admin endpoints without credentials
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Breaker numbers are not validated here; out-of-range values fall back
//!   to defaults when each breaker is built

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ServiceConfig, StoreBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("store.url must not be empty when store.backend = \"redis\"")]
    MissingStoreUrl,

    #[error("store.command_timeout_ms must be greater than zero")]
    ZeroCommandTimeout,

    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("admin.api_key must be set when admin endpoints are enabled")]
    MissingAdminKey,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.store.backend == StoreBackend::Redis && config.store.url.trim().is_empty() {
        errors.push(ValidationError::MissingStoreUrl);
    }
    if config.store.command_timeout_ms == 0 {
        errors.push(ValidationError::ZeroCommandTimeout);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
