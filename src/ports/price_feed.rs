//! Price Feed Port - Inbound Interface for Chart Views
//!
//! What chart and detail views call. The rest of the application
//! depends on this trait only, never on provider transport details.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::series::{PricePoint, PriceSummary, SeriesKind, SeriesSource};
use crate::domain::symbol::canonical_symbol;
use crate::domain::timeframe::Timeframe;
use crate::error::FeedResult;

/// Identity of an active subscription: canonical coin symbol + timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Extracted, uppercased coin symbol.
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SubscriptionKey {
    /// Build a key; display strings like `Bitcoin (BTC)` reduce to `BTC`.
    pub fn new(symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            symbol: canonical_symbol(symbol),
            timeframe,
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

/// Update delivered to a subscription callback.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    pub key: SubscriptionKey,
    /// Points from the batch just received, in provider order.
    pub points: Vec<PricePoint>,
    /// Summary over the subscription's merged series.
    pub summary: PriceSummary,
}

/// Callback invoked for every delivered update.
pub type UpdateCallback = Arc<dyn Fn(FeedUpdate) + Send + Sync>;

/// One-shot series with its summary.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub series: Vec<PricePoint>,
    pub summary: PriceSummary,
    pub source: SeriesSource,
}

/// Inbound feed interface.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Start streaming updates for `(symbol, timeframe)`.
    ///
    /// Repeated calls for the same key keep the first callback.
    async fn subscribe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        on_update: UpdateCallback,
    ) -> FeedResult<()>;

    /// Stop streaming for `(symbol, timeframe)`. No-op for unknown keys.
    async fn unsubscribe(&self, symbol: &str, timeframe: Timeframe);

    /// Series for a chart, live when a subscription can supply one.
    async fn get_snapshot(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        kind: SeriesKind,
        prefer_live: bool,
    ) -> Snapshot;
}
