//! taskhub: a users/projects/tasks API behind a request-admission layer.

pub mod admin;
pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod store;

pub use config::{AppConfig, ConfigStore};
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
