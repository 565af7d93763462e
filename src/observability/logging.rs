//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Pick the default filter from configuration, with `RUST_LOG` taking precedence
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Audit records go to the `taskhub::audit` target so they can be filtered
//!   or routed independently

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Default directive set for a configured level.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    format!(
        "taskhub={level},taskhub::audit=info,tower_http={level}",
        level = config.log_level
    )
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
