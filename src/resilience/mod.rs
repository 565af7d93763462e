//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request:
//!     → bulkhead.rs (per-group admission, immediate reject when full)
//!     → handler
//!         → retries.rs (each data call, backoff from backoff.rs)
//!     → permit released exactly once
//! ```
//!
//! # Design Decisions
//! - Saturation in one group never blocks another
//! - Retry policy is read from the request's pinned snapshot
//! - Writes retry only with an idempotency key

pub mod backoff;
pub mod bulkhead;
pub mod retries;

pub use bulkhead::{BulkheadPermit, BulkheadRegistry, GroupStats};
pub use retries::RetryPolicy;
