//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → request.rs (request ID, pin configuration snapshot)
//!     → security::gatekeeper (admit or reject)
//!     → resilience::bulkhead (per-group admission)
//!     → api / admin handlers
//!     → response.rs (rejection taxonomy → status + JSON body)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{PinnedConfig, RequestIdExt, X_REQUEST_ID};
pub use response::Rejection;
pub use server::{AppState, HttpServer};
