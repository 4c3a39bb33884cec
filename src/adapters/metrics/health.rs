//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready endpoints via axum 0.7. Readiness follows
//! the supervisor: ready only while the push feed is `Live` and the
//! tick journal (when recording) still accepts writes.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use crate::adapters::persistence::LogSink;
use crate::domain::{FeedState, FeedStatus};

/// Shared health state polled by readiness probes.
#[derive(Clone)]
pub struct HealthState {
    /// Latest supervisor snapshot.
    status_rx: watch::Receiver<FeedStatus>,
    /// Sink whose journal must stay writable.
    sink: Option<Arc<LogSink>>,
}

impl HealthState {
    /// Health state backed by the supervisor's status channel.
    pub const fn new(status_rx: watch::Receiver<FeedStatus>) -> Self {
        Self {
            status_rx,
            sink: None,
        }
    }

    /// Also require the sink's journal to be writable.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Whether the feed is currently live.
    pub fn is_live(&self) -> bool {
        self.status_rx.borrow().state == FeedState::Live
    }

    /// Whether the journal accepts writes. True without a sink.
    pub async fn journal_healthy(&self) -> bool {
        match &self.sink {
            Some(sink) => sink.is_healthy().await,
            None => true,
        }
    }

    /// Latest snapshot.
    pub fn status(&self) -> FeedStatus {
        *self.status_rx.borrow()
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    /// Health state shared with the handlers.
    state: Arc<HealthState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    /// Create a new health server.
    pub const fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Routes without a listener, for serving or in-process tests.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(liveness))
            .route("/ready", get(readiness))
            .with_state(Arc::clone(&self.state))
    }

    /// Run the health check server until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

/// Liveness probe: always 200 while the process is running.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 200 only while the feed is live and the journal writable.
async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    if !state.is_live() {
        (StatusCode::SERVICE_UNAVAILABLE, "STALE")
    } else if !state.journal_healthy().await {
        (StatusCode::SERVICE_UNAVAILABLE, "JOURNAL_UNWRITABLE")
    } else {
        (StatusCode::OK, "READY")
    }
}
