//! Market Data Provider Port - Outbound Streaming Interface
//!
//! Defines the trait the use-case layer needs from an external
//! streaming price provider: one logical connection, and chart sessions
//! scoped to a (ticker, resolution token) pair that push provider-native
//! bar batches.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Provider-assigned chart session identifier.
pub type SessionId = String;

/// An open chart session.
///
/// `bars` yields provider-native payloads (`{ "bars": [...] }`) until the
/// provider closes the session or the connection drops.
#[derive(Debug)]
pub struct ChartSession {
    /// Session identifier, used to close it.
    pub id: SessionId,
    /// Push channel of raw bar batches.
    pub bars: mpsc::Receiver<Value>,
}

impl ChartSession {
    pub fn new(id: impl Into<SessionId>, bars: mpsc::Receiver<Value>) -> Self {
        Self {
            id: id.into(),
            bars,
        }
    }
}

/// Trait for streaming price-data providers.
///
/// Implementors own the transport. The connection manager guarantees
/// `connect` is never called concurrently with itself.
#[async_trait]
pub trait MarketDataProvider: Send + Sync + 'static {
    /// Establish the transport and perform the handshake.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Close the transport. Open sessions end with it.
    async fn disconnect(&self) -> anyhow::Result<()>;

    /// Open a chart session for a provider ticker and resolution token.
    async fn open_chart_session(&self, ticker: &str, timeframe: &str)
    -> anyhow::Result<ChartSession>;

    /// Close a previously opened chart session.
    async fn close_chart_session(&self, session_id: &str) -> anyhow::Result<()>;

    /// Whether the transport is still up. Lets the connection manager
    /// notice a dropped socket and reconnect on the next `connect()`.
    fn is_connected(&self) -> bool;

    /// Short provider name for logs and metric labels.
    fn name(&self) -> &'static str;
}
