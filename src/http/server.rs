//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and stop on the shutdown signal

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::ProxyConfig;
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::proxy::{Executor, UpstreamError};
use crate::rules::RuleStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<Executor>,
    pub config: Arc<ProxyConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn store(&self) -> &Arc<RuleStore> {
        self.executor.store()
    }
}

/// HTTP server for the dev proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server serving the rules held by `store`.
    pub fn new(config: ProxyConfig, store: Arc<RuleStore>) -> Result<Self, UpstreamError> {
        let executor = Arc::new(Executor::new(&config, store)?);
        let state = AppState {
            executor,
            config: Arc::new(config),
            started_at: Instant::now(),
        };

        let router = Self::build_router(&state);
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                state.config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span::<Body>))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// The proxy router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler: decide, then execute.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.executor.handle(request).await
}
