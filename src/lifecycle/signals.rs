//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP reloads configuration from disk, not shutdown
//! - A failed reload keeps the current snapshot

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::ConfigStore;
use crate::lifecycle::shutdown::Shutdown;

/// Spawn the signal loop. It exits once shutdown has been triggered.
pub fn spawn_signal_handler(shutdown: Arc<Shutdown>, config: Arc<ConfigStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut term, mut hup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
                (Ok(term), Ok(hup)) => (term, hup),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, "Failed to register signal handlers, falling back to Ctrl+C");
                    wait_ctrl_c().await;
                    shutdown.trigger();
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = wait_ctrl_c() => {
                        tracing::info!("SIGINT received");
                        break;
                    }
                    _ = term.recv() => {
                        tracing::info!("SIGTERM received");
                        break;
                    }
                    _ = hup.recv() => {
                        tracing::info!("SIGHUP received, reloading configuration");
                        reload(&config);
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = &config;
            wait_ctrl_c().await;
            tracing::info!("Ctrl+C received");
        }

        shutdown.trigger();
    })
}

async fn wait_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

fn reload(config: &ConfigStore) {
    match config.reload() {
        Ok(snapshot) => tracing::info!(port = snapshot.server.port, "Configuration reloaded"),
        Err(e) => tracing::error!(error = %e, "Reload failed, keeping current configuration"),
    }
}
