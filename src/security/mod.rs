//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → gatekeeper.rs (denylist, then drive the stages below)
//!     → rate_limit.rs (per-IP fixed window)
//!     → sanitize.rs (params, query, top-level body fields)
//!     → identity.rs (derive caller role)
//!     → routing::router (endpoint policy)
//!     → Pass to bulkhead
//! ```
//!
//! # Design Decisions
//! - Fail closed: any stage error rejects the request
//! - Cheapest checks run first
//! - One configuration snapshot per request

pub mod gatekeeper;
pub mod identity;
pub mod rate_limit;
pub mod sanitize;

pub use gatekeeper::{gatekeeper_middleware, GateContext, Gatekeeper};
pub use identity::{Role, RoleResolver};
pub use rate_limit::FixedWindowLimiter;
