//! Crypto Chart Feed — Entry Point
//!
//! Initializes configuration, logging, the market-data provider and the
//! feed facade, then streams the configured watchlist until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build the provider (TradingView WebSocket or synthetic)
//! 4. Build FeedMetrics + MarketDataFeed
//! 5. Spawn health/metrics server (/live, /ready, /metrics)
//! 6. Subscribe every watchlist entry, log an initial snapshot each
//! 7. Wait for SIGINT → unsubscribe all → disconnect → exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crypto_chart_feed::adapters::feeds::{SyntheticProvider, TradingViewProvider};
use crypto_chart_feed::adapters::metrics::{FeedMetrics, HealthServer};
use crypto_chart_feed::config::{self, AppConfig, ProviderKind};
use crypto_chart_feed::domain::synthetic::SyntheticSeriesGenerator;
use crypto_chart_feed::ports::price_feed::{FeedUpdate, PriceFeed, UpdateCallback};
use crypto_chart_feed::ports::provider::MarketDataProvider;
use crypto_chart_feed::usecases::MarketDataFeed;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.feed.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.feed.name,
        version = env!("CARGO_PKG_VERSION"),
        provider = ?config.provider.kind,
        watchlist = config.watchlist.len(),
        "Starting crypto chart feed"
    );

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 3. Provider ─────────────────────────────────────────
    let generator = SyntheticSeriesGenerator::new(config.synthetic.params());
    let provider = build_provider(&config, &generator);

    // ── 4. Metrics + feed facade ────────────────────────────
    let metrics = Arc::new(FeedMetrics::new().context("Failed to register metrics")?);
    let feed = Arc::new(MarketDataFeed::new(
        provider,
        config.symbols.mapper(),
        generator,
        config.feed.options(),
        Arc::clone(&metrics),
    ));

    // ── 5. Health/metrics server ────────────────────────────
    let health_handle = if config.metrics.enabled {
        let server = HealthServer::new(
            feed.connection().subscribe_state(),
            Arc::clone(&metrics),
            config.metrics.bind_address.clone(),
        );
        let health_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(health_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }))
    } else {
        None
    };

    // ── 6. Watchlist ────────────────────────────────────────
    subscribe_watchlist(&feed, &config).await;

    info!("Feed is running");

    // ── 7. Wait for SIGINT ──────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for SIGINT, shutting down");
    } else {
        info!("SIGINT received, initiating graceful shutdown");
    }

    for entry in &config.watchlist {
        feed.unsubscribe(&entry.symbol, entry.timeframe()).await;
    }
    feed.disconnect().await;

    let _ = shutdown_tx.send(());
    if let Some(handle) = health_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

fn build_provider(
    config: &AppConfig,
    generator: &SyntheticSeriesGenerator,
) -> Arc<dyn MarketDataProvider> {
    match config.provider.kind {
        ProviderKind::Tradingview => Arc::new(TradingViewProvider::new(&config.provider)),
        ProviderKind::Synthetic => Arc::new(SyntheticProvider::new(
            generator.clone(),
            Duration::from_millis(config.provider.tick_interval_ms),
            config.provider.channel_capacity,
        )),
    }
}

/// Subscribe each watchlist entry and log its first snapshot.
///
/// Subscription failures are logged; the snapshot then comes from the
/// synthetic generator.
async fn subscribe_watchlist(feed: &MarketDataFeed, config: &AppConfig) {
    let on_update: UpdateCallback = Arc::new(|update: FeedUpdate| {
        info!(
            key = %update.key,
            points = update.points.len(),
            current_price = update.summary.current_price,
            change_abs = update.summary.change_absolute,
            change_pct = update.summary.change_percent,
            "Price update"
        );
    });

    for entry in &config.watchlist {
        let timeframe = entry.timeframe();

        if let Err(e) = feed
            .subscribe(&entry.symbol, timeframe, Arc::clone(&on_update))
            .await
        {
            warn!(symbol = %entry.symbol, timeframe = %timeframe, error = %e, "Subscribe failed");
        }

        let snapshot = feed
            .get_snapshot(&entry.symbol, timeframe, entry.kind, true)
            .await;
        info!(
            symbol = %entry.symbol,
            timeframe = %timeframe,
            source = snapshot.source.as_str(),
            points = snapshot.series.len(),
            current_price = snapshot.summary.current_price,
            change_pct = snapshot.summary.change_percent,
            "Initial snapshot"
        );
    }
}
