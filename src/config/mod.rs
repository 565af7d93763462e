//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → store.rs (ArcSwap<AppConfig>, one snapshot pinned per request)
//!
//! On change:
//!     watcher.rs detects file change / SIGHUP / admin PUT or PATCH
//!     → loader.rs loads new config (or store.rs merges the update)
//!     → validation.rs validates
//!     → atomic swap of Arc<AppConfig>
//!     → requests admitted afterwards observe the new snapshot
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; changes always produce a whole new snapshot
//! - All fields have defaults to allow minimal configs
//! - A request never mixes two snapshots

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use schema::{
    AppConfig, BulkheadConfig, DatabaseConfig, DatastoreEndpoint, FeatureFlags, GatekeeperConfig,
    IdentityConfig, IdentityMode, ObservabilityConfig, RetryConfig, ServerConfig, REDACTED,
};
pub use store::ConfigStore;
