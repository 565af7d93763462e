//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, multipliers, ceilings, windows)
//! - Reject token identity without a verification secret
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{AppConfig, IdentityMode};

/// A single semantic problem found in a configuration snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("server.port must be non-zero")]
    ZeroPort,

    #[error("retry.backoff_multiplier must be >= 1.0 (got {0})")]
    BackoffMultiplier(f64),

    #[error("bulkhead.concurrency.{group} must be >= 1")]
    ZeroGroupLimit { group: String },

    #[error("gatekeeper.rate_limit_window_secs must be >= 1")]
    ZeroWindow,

    #[error("gatekeeper.rate_limit_max_requests must be >= 1")]
    ZeroRequestCeiling,

    #[error("gatekeeper.sweep_interval_secs must be >= 1")]
    ZeroSweepInterval,

    #[error("identity.jwt_secret must be set when identity.mode = \"token\"")]
    MissingJwtSecret,
}

/// Check a snapshot for semantic errors.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    // NaN fails this comparison too.
    if !(config.retry.backoff_multiplier >= 1.0) {
        errors.push(ValidationError::BackoffMultiplier(config.retry.backoff_multiplier));
    }

    for (group, limit) in &config.bulkhead.concurrency {
        if *limit == 0 {
            errors.push(ValidationError::ZeroGroupLimit { group: group.clone() });
        }
    }

    if config.gatekeeper.rate_limit_window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if config.gatekeeper.rate_limit_max_requests == 0 {
        errors.push(ValidationError::ZeroRequestCeiling);
    }
    if config.gatekeeper.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    if config.identity.mode == IdentityMode::Token && config.identity.jwt_secret.is_empty() {
        errors.push(ValidationError::MissingJwtSecret);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
