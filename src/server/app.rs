//! Main application server.
//!
//! Wires the coordinator, the file watcher, and the HTTP transports
//! together, with signal handling and graceful shutdown coordination.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use parking_lot::Mutex;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::rest::create_rest_router;
use super::tools::create_tool_router;
use crate::coordinator::IndexCoordinator;
use crate::index::VectorStore;
use crate::watcher::FileWatcher;
use crate::{Error, Result};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Bounded wait for in-flight work on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// A running watch subscription: the OS watcher, its event pump task, and
/// the token that stops the pump.
struct WatchSession {
    _watcher: FileWatcher,
    pump: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

/// Application server.
pub struct App {
    config: ServerConfig,
    coordinator: Arc<IndexCoordinator>,
    store: VectorStore,
}

impl App {
    /// Create a new application.
    #[must_use]
    pub fn new(config: ServerConfig, coordinator: Arc<IndexCoordinator>, store: VectorStore) -> Self {
        Self {
            config,
            coordinator,
            store,
        }
    }

    /// Build the router with all endpoints.
    #[must_use]
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .merge(create_rest_router(Arc::clone(&self.coordinator)))
            .merge(create_tool_router(Arc::clone(&self.coordinator)))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &axum::http::Request<_>| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                        )
                    })
                    .on_response(
                        |response: &axum::response::Response,
                         _latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::info!(status = %response.status(), "Request completed");
                        },
                    ),
            )
            .layer(cors)
    }

    /// Run the server until shutdown signal.
    ///
    /// Dependency initialization (embedding model, storage) runs in the
    /// background so the transports can answer status requests immediately;
    /// an initialization failure leaves the coordinator permanently in the
    /// error state with no retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start or encounters a fatal
    /// error during execution.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::internal(format!("failed to bind to {addr}: {e}")))?;

        tracing::info!(%addr, "Server listening");

        let watch_slot: Arc<Mutex<Option<WatchSession>>> = Arc::new(Mutex::new(None));

        tokio::spawn(initialize_dependencies(
            Arc::clone(&self.coordinator),
            self.store.clone(),
            Arc::clone(&watch_slot),
        ));

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(format!("server error: {e}")))?;

        teardown(
            &self.coordinator,
            &watch_slot,
            self.config.shutdown_timeout,
        )
        .await;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Initialize the backend, then start watching and the initial scan.
async fn initialize_dependencies(
    coordinator: Arc<IndexCoordinator>,
    store: VectorStore,
    watch_slot: Arc<Mutex<Option<WatchSession>>>,
) {
    tracing::info!("Starting dependency initialization");

    // A backend/embedding init failure is a configuration failure:
    // permanent error state, no automatic retry.
    if let Err(e) = store.init().await {
        coordinator.mark_error(format!("Initialization failed: {e}"));
        return;
    }

    let session = match start_watching(&coordinator) {
        Ok(session) => session,
        Err(e) => {
            coordinator.mark_error(format!("Failed to start file watcher: {e}"));
            return;
        }
    };
    *watch_slot.lock() = Some(session);

    coordinator.mark_watching();
    tracing::info!("Dependencies initialized; server is watching");

    // Initial scan brings the index up to date with the tree
    if let Err(e) = Arc::clone(&coordinator).request_scan(false) {
        tracing::warn!(error = %e, "Initial scan not started");
    }
}

/// Subscribe to file notifications and start the event pump.
fn start_watching(coordinator: &Arc<IndexCoordinator>) -> Result<WatchSession> {
    let mut watcher = FileWatcher::new(coordinator.project_root())?;
    let events = watcher
        .take_events()
        .ok_or_else(|| Error::internal("watcher events already taken"))?;

    let cancel = CancellationToken::new();
    let pump = Arc::clone(coordinator).spawn_event_pump(events, cancel.clone());

    Ok(WatchSession {
        _watcher: watcher,
        pump,
        cancel,
    })
}

/// Stop the watch session with a bounded wait and finalize coordinator
/// state. Never blocks forever: a pump that does not stop in time is
/// abandoned with a warning.
async fn teardown(
    coordinator: &Arc<IndexCoordinator>,
    watch_slot: &Arc<Mutex<Option<WatchSession>>>,
    timeout: Duration,
) {
    let session = watch_slot.lock().take();

    if let Some(session) = session {
        tracing::info!("Stopping file watcher");
        session.cancel.cancel();
        drop(session._watcher);

        match tokio::time::timeout(timeout, session.pump).await {
            Ok(_) => tracing::info!("Event pump stopped"),
            Err(_) => {
                tracing::warn!("Event pump did not stop within timeout; abandoning");
            }
        }
    }

    coordinator.shutdown();
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
