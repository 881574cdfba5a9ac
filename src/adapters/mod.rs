//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (WebSockets, HTTP, Prometheus).
//!
//! Adapter categories:
//! - `feeds`: chart data providers (TradingView WebSocket, synthetic)
//! - `metrics`: Prometheus metrics export and health checks

pub mod feeds;
pub mod metrics;
