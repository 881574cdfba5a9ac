//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness follows
//! the provider connection: 200 only while it is `Connected`.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use super::prometheus::FeedMetrics;
use crate::usecases::connection_manager::ConnectionState;

/// Axum-based health and metrics HTTP server.
pub struct HealthServer {
    /// Connection state published by the connection manager.
    state_rx: watch::Receiver<ConnectionState>,
    /// Metrics rendered on /metrics.
    metrics: Arc<FeedMetrics>,
    /// Bind address, e.g. `0.0.0.0:9090`.
    bind_address: String,
}

impl HealthServer {
    pub fn new(
        state_rx: watch::Receiver<ConnectionState>,
        metrics: Arc<FeedMetrics>,
        bind_address: impl Into<String>,
    ) -> Self {
        Self {
            state_rx,
            metrics,
            bind_address: bind_address.into(),
        }
    }

    /// Build the router (separate from `run` so it can be tested in-process).
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(self.state_rx.clone())
            .merge(Arc::clone(&self.metrics).router())
    }

    /// Serve until the shutdown signal fires.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!(address = %self.bind_address, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 only while the provider connection is up.
    async fn readiness(State(rx): State<watch::Receiver<ConnectionState>>) -> impl IntoResponse {
        if *rx.borrow() == ConnectionState::Connected {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readiness_follows_connection_state() {
        let (tx, rx) = watch::channel(ConnectionState::Connecting);

        let response = HealthServer::readiness(State(rx.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        tx.send_replace(ConnectionState::Connected);
        let response = HealthServer::readiness(State(rx)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_liveness_always_ok() {
        let response = HealthServer::liveness().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
