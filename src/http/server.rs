//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, body limit,
//!   snapshot pinning, gatekeeper, per-group bulkheads)
//! - Bind server to listener
//! - Swap in configuration updates from the file watcher
//!
//! # Layer order (outermost first)
//! ```text
//! TraceLayer → request id → body limit → timeout
//!     → pin_snapshot → gatekeeper → [route] bulkhead(group) → handler
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::api::{projects, statistics, tasks, users};
use crate::config::{AppConfig, ConfigStore};
use crate::http::request::{pin_snapshot, propagate_request_id_layer, set_request_id_layer};
use crate::resilience::bulkhead::{bulkhead_middleware, BulkheadLayerState, BulkheadRegistry};
use crate::routing::matcher::PatternError;
use crate::routing::router::PolicyTable;
use crate::security::{gatekeeper_middleware, FixedWindowLimiter, Gatekeeper};
use crate::store::DataStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub gatekeeper: Arc<Gatekeeper>,
    pub bulkhead: Arc<BulkheadRegistry>,
    pub store: Arc<dyn DataStore>,
}

impl AppState {
    /// Build the process-wide state with the shipped endpoint policies.
    pub fn new(config: Arc<ConfigStore>, store: Arc<dyn DataStore>) -> Result<Self, PatternError> {
        let gatekeeper = Gatekeeper::new(
            PolicyTable::standard()?,
            Arc::new(FixedWindowLimiter::new()),
        );
        Ok(Self {
            config,
            gatekeeper: Arc::new(gatekeeper),
            bulkhead: Arc::new(BulkheadRegistry::new()),
            store,
        })
    }
}

/// HTTP server for the task API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Timeout and body limit come from the snapshot current at build time.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let startup = state.config.snapshot();
        let guarded = |group: &'static str, routes: Router<AppState>| {
            routes.route_layer(from_fn_with_state(
                BulkheadLayerState {
                    registry: Arc::clone(&state.bulkhead),
                    group,
                },
                bulkhead_middleware,
            ))
        };

        let users = guarded(
            "users",
            Router::new()
                .route("/users", get(users::list_users).post(users::create_user))
                .route("/users/{id}", delete(users::delete_user))
                .route("/users/{id}/tasks", get(users::user_tasks)),
        );

        let projects = guarded(
            "projects",
            Router::new()
                .route("/projects", get(projects::list_projects).post(projects::create_project))
                .route(
                    "/projects/{id}",
                    get(projects::get_project)
                        .put(projects::update_project)
                        .delete(projects::delete_project),
                )
                .route("/projects/{id}/tasks", get(projects::project_tasks))
                .route("/projects/{id}/tasks/pending", get(projects::pending_project_tasks)),
        );

        let tasks = guarded(
            "tasks",
            Router::new()
                .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
                .route(
                    "/tasks/{id}",
                    get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
                ),
        );

        let statistics = guarded(
            "statistics",
            Router::new()
                .route("/statistics", get(statistics::all_statistics))
                .route("/statistics/{*section}", get(statistics::project_statistics)),
        );

        Router::new()
            .merge(users)
            .merge(projects)
            .merge(tasks)
            .merge(statistics)
            .merge(setup_admin_router())
            .with_state(state.clone())
            .layer(from_fn_with_state(Arc::clone(&state.gatekeeper), gatekeeper_middleware))
            .layer(from_fn_with_state(Arc::clone(&state.config), pin_snapshot))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(set_request_id_layer())
                    .layer(propagate_request_id_layer())
                    .layer(RequestBodyLimitLayer::new(startup.server.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        startup.server.request_timeout_secs,
                    ))),
            )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations arriving on `config_updates` (already validated by the
    /// watcher) are swapped in for requests admitted afterwards.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let store = Arc::clone(&self.state.config);
        let mut updates_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => store.install(config, "watch"),
                        None => break,
                    },
                    _ = updates_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
