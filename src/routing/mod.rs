//! Endpoint policy routing.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (ordered policy scan)
//!     → matcher.rs (segment-wise pattern match, parameter capture)
//!     → Return: matched policy + params, or no match
//! ```
//!
//! # Design Decisions
//! - Policies compiled at startup, immutable at runtime
//! - No regex in hot path
//! - First match wins (declaration order)

pub mod matcher;
pub mod router;

pub use router::{EndpointPolicy, PolicyTable};
