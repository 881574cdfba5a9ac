//! Metrics and Monitoring Adapters
//!
//! Prometheus metrics for the feed layer and the axum server that exposes
//! them next to the liveness/readiness probes.

pub mod health;
pub mod prometheus;

pub use health::HealthServer;
pub use prometheus::FeedMetrics;
