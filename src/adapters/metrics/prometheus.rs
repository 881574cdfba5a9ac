//! Prometheus Metrics Registry - Feed Observability
//!
//! Registers and exposes Prometheus metrics for the market-data feed:
//! connection state, handshakes, active subscriptions, delivered and
//! dropped updates, snapshot sources and swallowed teardown errors.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::usecases::connection_manager::ConnectionState;

/// Centralized Prometheus metrics for the feed layer.
///
/// All metrics follow the naming convention `chart_feed_*`.
pub struct FeedMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=failed).
    pub connection_state: IntGauge,
    /// Provider handshakes by outcome.
    pub handshakes: IntCounterVec,
    /// Currently registered subscriptions.
    pub subscriptions_active: IntGauge,
    /// Chart session opens by outcome.
    pub session_opens: IntCounterVec,
    /// Updates delivered to callbacks, per timeframe.
    pub updates_delivered: IntCounterVec,
    /// Updates dropped before delivery, per reason.
    pub updates_dropped: IntCounterVec,
    /// Snapshots served, per source.
    pub snapshots: IntCounterVec,
    /// Provider teardown errors swallowed, per operation.
    pub teardown_errors: IntCounterVec,
}

impl FeedMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let connection_state = IntGauge::new(
            "chart_feed_connection_state",
            "Provider connection state (0=disconnected, 1=connecting, 2=connected, 3=failed)",
        )?;

        let handshakes = IntCounterVec::new(
            Opts::new("chart_feed_handshakes_total", "Provider handshakes attempted"),
            &["outcome"],
        )?;

        let subscriptions_active = IntGauge::new(
            "chart_feed_subscriptions_active",
            "Currently registered (symbol, timeframe) subscriptions",
        )?;

        let session_opens = IntCounterVec::new(
            Opts::new("chart_feed_session_opens_total", "Chart session open attempts"),
            &["outcome"],
        )?;

        let updates_delivered = IntCounterVec::new(
            Opts::new(
                "chart_feed_updates_delivered_total",
                "Normalized updates delivered to subscription callbacks",
            ),
            &["timeframe"],
        )?;

        let updates_dropped = IntCounterVec::new(
            Opts::new(
                "chart_feed_updates_dropped_total",
                "Provider updates dropped before delivery",
            ),
            &["reason"],
        )?;

        let snapshots = IntCounterVec::new(
            Opts::new("chart_feed_snapshots_total", "Snapshots served"),
            &["source"],
        )?;

        let teardown_errors = IntCounterVec::new(
            Opts::new(
                "chart_feed_teardown_errors_total",
                "Provider close errors swallowed after local cleanup",
            ),
            &["operation"],
        )?;

        // Register all metrics
        registry.register(Box::new(connection_state.clone()))?;
        registry.register(Box::new(handshakes.clone()))?;
        registry.register(Box::new(subscriptions_active.clone()))?;
        registry.register(Box::new(session_opens.clone()))?;
        registry.register(Box::new(updates_delivered.clone()))?;
        registry.register(Box::new(updates_dropped.clone()))?;
        registry.register(Box::new(snapshots.clone()))?;
        registry.register(Box::new(teardown_errors.clone()))?;

        Ok(Self {
            registry,
            connection_state,
            handshakes,
            subscriptions_active,
            session_opens,
            updates_delivered,
            updates_dropped,
            snapshots,
            teardown_errors,
        })
    }

    /// Record a connection state transition.
    pub fn set_connection_state(&self, state: ConnectionState) {
        self.connection_state.set(state.as_gauge());
    }

    /// Render all metric families in the Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "Failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Router serving `/metrics`.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&self);
                async move { metrics.encode() }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_registered_metrics() {
        let metrics = FeedMetrics::new().unwrap();
        metrics.set_connection_state(ConnectionState::Connected);
        metrics.updates_dropped.with_label_values(&["stale"]).inc();

        let text = metrics.encode();
        assert!(text.contains("chart_feed_connection_state 2"));
        assert!(text.contains("chart_feed_updates_dropped_total{reason=\"stale\"} 1"));
    }
}
