//! Market Data Feed - Facade for Chart Views
//!
//! Composes the connection manager, subscription registry and synthetic
//! generator behind the `PriceFeed` port. Snapshots come from a live
//! subscription when one can supply a series, otherwise from the
//! synthetic generator, so chart code runs the same either way.
//!
//! A candlestick request is only served live when the live series has at
//! least one full OHLC point; a close-only feed falls back to synthetic
//! candles. Mixed series are served as-is.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::connection_manager::{ConnectionManager, ConnectionState};
use super::subscription_registry::SubscriptionRegistry;
use crate::adapters::metrics::FeedMetrics;
use crate::domain::series::{
    PricePoint, PriceSummary, SeriesKind, SeriesSource, is_strictly_ascending,
};
use crate::domain::symbol::SymbolMapper;
use crate::domain::synthetic::SyntheticSeriesGenerator;
use crate::domain::timeframe::Timeframe;
use crate::error::FeedResult;
use crate::ports::price_feed::{PriceFeed, Snapshot, SubscriptionKey, UpdateCallback};
use crate::ports::provider::MarketDataProvider;

/// Facade tuning.
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// How long a live snapshot waits for a subscription's first update.
    pub snapshot_wait: Duration,
    /// Rolling series cap per subscription.
    pub max_series_len: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            snapshot_wait: Duration::from_secs(5),
            max_series_len: super::subscription_registry::DEFAULT_MAX_SERIES_LEN,
        }
    }
}

/// Single entry point for chart and detail views.
pub struct MarketDataFeed {
    connection: Arc<ConnectionManager>,
    registry: SubscriptionRegistry,
    generator: SyntheticSeriesGenerator,
    options: FeedOptions,
    metrics: Arc<FeedMetrics>,
}

impl MarketDataFeed {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        symbols: SymbolMapper,
        generator: SyntheticSeriesGenerator,
        options: FeedOptions,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        let connection = Arc::new(ConnectionManager::new(provider, Arc::clone(&metrics)));
        let registry = SubscriptionRegistry::new(
            Arc::clone(&connection),
            symbols,
            options.max_series_len,
            Arc::clone(&metrics),
        );

        Self {
            connection,
            registry,
            generator,
            options,
            metrics,
        }
    }

    /// The connection manager (state watch, explicit connect).
    pub const fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Currently subscribed keys.
    pub async fn active_subscriptions(&self) -> Vec<SubscriptionKey> {
        self.registry.active_keys().await
    }

    /// Invalidate every subscription, then close the provider connection.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        self.registry.clear().await;
        self.connection.disconnect().await;
    }

    /// Live series for a key, or `None` when nothing usable exists.
    async fn live_series(&self, key: &SubscriptionKey) -> Option<Vec<PricePoint>> {
        if !self.registry.contains(key).await {
            return None;
        }

        let series = match self.registry.latest_series(key).await {
            Some(series) if !series.is_empty() => series,
            _ => {
                self.registry
                    .wait_for_series(key, self.options.snapshot_wait)
                    .await?
            }
        };

        if is_strictly_ascending(&series) {
            Some(series)
        } else {
            warn!(key = %key, "Live series out of order, using synthetic data");
            None
        }
    }
}

#[async_trait]
impl PriceFeed for MarketDataFeed {
    async fn subscribe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        on_update: UpdateCallback,
    ) -> FeedResult<()> {
        self.registry.subscribe(symbol, timeframe, on_update).await
    }

    async fn unsubscribe(&self, symbol: &str, timeframe: Timeframe) {
        self.registry.unsubscribe(symbol, timeframe).await;
    }

    #[instrument(skip(self))]
    async fn get_snapshot(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        kind: SeriesKind,
        prefer_live: bool,
    ) -> Snapshot {
        let key = SubscriptionKey::new(symbol, timeframe);

        let live = if prefer_live {
            self.live_series(&key).await
        } else {
            None
        };

        let live = live.and_then(|series| match kind {
            SeriesKind::Simple => Some(series.into_iter().map(PricePoint::to_simple).collect()),
            SeriesKind::Ohlcv if series.iter().any(PricePoint::has_ohlc) => Some(series),
            SeriesKind::Ohlcv => {
                debug!(key = %key, "Live series carries no candles, using synthetic data");
                None
            }
        });

        let (series, source) = match live {
            Some(series) => (series, SeriesSource::Live),
            None => {
                debug!(key = %key, "Serving synthetic series");
                (self.generator.generate(timeframe, kind), SeriesSource::Synthetic)
            }
        };

        let summary = PriceSummary::from_points(&series);
        self.metrics
            .snapshots
            .with_label_values(&[source.as_str()])
            .inc();

        info!(
            key = %key,
            source = source.as_str(),
            points = series.len(),
            current_price = summary.current_price,
            change_pct = summary.change_percent,
            "Snapshot served"
        );

        Snapshot {
            series,
            summary,
            source,
        }
    }
}
