//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration (or persist defaults on first run)
//! - Initialize logging and metrics
//! - Build owned state and start background tasks (watcher, sweeper, signals)
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::watcher::ConfigWatcher;
use crate::config::{AppConfig, ConfigError, ConfigStore};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::observability::{logging, metrics};
use crate::routing::matcher::PatternError;
use crate::security::rate_limit::run_sweeper;
use crate::store::MemoryStore;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("endpoint policies: {0}")]
    Policies(#[from] PatternError),

    #[error("config watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub config_path: PathBuf,
    /// Overrides `observability.metrics_enabled` for this run only.
    pub metrics: Option<bool>,
}

/// Open the store at `path`, writing defaults there if the file is missing.
pub fn open_or_init(path: &std::path::Path) -> Result<ConfigStore, ConfigError> {
    if path.exists() {
        return ConfigStore::open(path);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    ConfigStore::create(path, AppConfig::default())
}

pub async fn run(options: StartupOptions) -> Result<(), StartupError> {
    let config = Arc::new(open_or_init(&options.config_path)?);
    let snapshot = config.snapshot();

    logging::init_logging(&snapshot.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        path = %options.config_path.display(),
        environment = %snapshot.server.environment,
        identity_mode = ?snapshot.identity.mode,
        "taskhub starting"
    );

    if options.metrics.unwrap_or(snapshot.observability.metrics_enabled) {
        match snapshot.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %snapshot.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(MemoryStore::seeded().await);
    let state = AppState::new(Arc::clone(&config), store)?;

    let (watcher, config_updates) = ConfigWatcher::new(&options.config_path);
    let _watcher = watcher.run()?;

    let shutdown = Arc::new(Shutdown::new());
    tokio::spawn(run_sweeper(
        Arc::clone(state.gatekeeper.limiter()),
        Arc::clone(&config),
        shutdown.subscribe(),
    ));
    let server_shutdown = shutdown.subscribe();
    spawn_signal_handler(Arc::clone(&shutdown), Arc::clone(&config));

    let listener = TcpListener::bind(("0.0.0.0", snapshot.server.port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(state)
        .run(listener, config_updates, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_run_persists_defaults() {
        let dir = std::env::temp_dir().join(format!("taskhub-startup-{}", uuid::Uuid::new_v4()));
        let path = dir.join("taskhub.toml");

        let store = open_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(*store.snapshot(), AppConfig::default());

        let reopened = open_or_init(&path).unwrap();
        assert_eq!(reopened.snapshot().server.port, 3000);

        std::fs::remove_dir_all(&dir).unwrap_or_default();
    }
}
