//! `RelayServer`: Axum HTTP + `WebSocket` relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::dispatch::{BroadcastQueue, spawn_dispatcher};
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::ingress::ingest_handler;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connection::CLOSE_GOING_AWAY;
use crate::websocket::upgrade::ws_handler;
use crate::websocket::{Broadcaster, ConnectionRegistry};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Registered subscribers.
    pub registry: Arc<ConnectionRegistry>,
    /// Producer side of the broadcast queue.
    pub queue: BroadcastQueue,
    /// Ticket checks for `/ws`.
    pub authenticator: Arc<Authenticator>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics_handle: Option<PrometheusHandle>,
}

/// The log relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<ConnectionRegistry>,
    queue: BroadcastQueue,
    authenticator: Arc<Authenticator>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics_handle: Option<PrometheusHandle>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl RelayServer {
    /// Create a new server and start its broadcast dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig, metrics_handle: Option<PrometheusHandle>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone(), config.send_timeout()));
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (queue, rx) = BroadcastQueue::new(config.broadcast_queue_capacity);
        let dispatcher = spawn_dispatcher(rx, broadcaster, shutdown.token());

        Self {
            authenticator: Arc::new(Authenticator::new(config.ticket.clone())),
            config: Arc::new(config),
            registry,
            queue,
            shutdown,
            start_time: Instant::now(),
            metrics_handle,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            registry: self.registry.clone(),
            queue: self.queue.clone(),
            authenticator: self.authenticator.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics_handle: self.metrics_handle.clone(),
        };

        Router::new()
            .route("/log", post(ingest_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .with_state(state)
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address and the serve task. The task ends once the
    /// shutdown token is cancelled and open connections have closed.
    pub async fn listen(
        &self,
    ) -> Result<(SocketAddr, JoinHandle<Result<(), ServerError>>), ServerError> {
        let bind_addr = self.config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr,
                source,
            })?;
        let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let app = self.router();
        let token = self.shutdown.token();
        let serve_token = token.clone();
        let handle = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { serve_token.cancelled().await })
            .await;
            result.map_err(|e| {
                error!(error = %e, "relay server stopped with error");
                token.cancel();
                ServerError::Serve(e)
            })
        });

        info!(%addr, strict_schema = self.config.strict_schema, "relay listening");
        Ok((addr, handle))
    }

    /// Serve until shutdown, then drain tasks within the configured timeout.
    ///
    /// A listener failure cancels the shutdown token and is returned here.
    pub async fn run(&self) -> Result<(), ServerError> {
        let (_, serve) = self.listen().await?;
        self.shutdown.token().cancelled().await;
        self.stop(serve).await
    }

    /// Cancel everything and wait for the serve task and dispatcher.
    ///
    /// Returns the serve task's error, if it failed.
    pub async fn stop(
        &self,
        serve: JoinHandle<Result<(), ServerError>>,
    ) -> Result<(), ServerError> {
        let closed = self.registry.close_all(CLOSE_GOING_AWAY);
        info!(subscribers = closed, "closing subscriber sessions");

        let timeout = self.config.shutdown_timeout();
        let serve_abort = serve.abort_handle();
        let dispatcher: Vec<_> = self.dispatcher.lock().take().into_iter().collect();
        let (served, ()) = tokio::join!(
            tokio::time::timeout(timeout, serve),
            self.shutdown.graceful_shutdown(dispatcher, timeout),
        );
        info!("relay stopped");

        match served {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(error = %e, "serve task failed");
                Ok(())
            }
            Err(_) => {
                warn!(?timeout, "listener did not drain in time, aborting");
                serve_abort.abort();
                Ok(())
            }
        }
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Request span without the query string, which carries the ticket on `/ws`.
fn request_span(req: &Request) -> tracing::Span {
    tracing::debug_span!("request", method = %req.method(), path = %req.uri().path())
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.len(),
        state.queue.pending(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
