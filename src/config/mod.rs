//! Configuration Module - TOML-based Feed Configuration
//!
//! Loads and validates configuration from `config.toml`. Provider
//! endpoints, symbol overrides and synthetic-walk tunables are all
//! externalized here; the domain layer only sees typed values.

pub mod loader;

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::series::SeriesKind;
use crate::domain::symbol::{DEFAULT_EXCHANGE, DEFAULT_QUOTE, SymbolMapper};
use crate::domain::synthetic::SyntheticParams;
use crate::domain::timeframe::Timeframe;
use crate::usecases::market_data_feed::FeedOptions;
use crate::usecases::subscription_registry::DEFAULT_MAX_SERIES_LEN;

/// Top-level feed configuration.
///
/// Loaded from `config.toml` at startup. Every section has defaults so a
/// minimal file only needs `[feed] name`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Process identity and snapshot tuning.
  pub feed: FeedConfig,
  /// Which provider to stream from.
  #[serde(default)]
  pub provider: ProviderConfig,
  /// Ticker synthesis and overrides.
  #[serde(default)]
  pub symbols: SymbolsConfig,
  /// Random-walk parameters.
  #[serde(default)]
  pub synthetic: SyntheticConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Charts to subscribe at startup.
  #[serde(default)]
  pub watchlist: Vec<WatchlistEntry>,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// How long a live snapshot waits for the first update.
  #[serde(default = "default_snapshot_wait")]
  pub snapshot_wait_ms: u64,
  /// Rolling series cap per subscription.
  #[serde(default = "default_max_series_len")]
  pub max_series_len: usize,
}

impl FeedConfig {
  pub fn options(&self) -> FeedOptions {
    FeedOptions {
      snapshot_wait: Duration::from_millis(self.snapshot_wait_ms),
      max_series_len: self.max_series_len,
    }
  }
}

/// Provider implementation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
  /// Public chart WebSocket.
  #[default]
  Tradingview,
  /// In-process random walk, no network.
  Synthetic,
}

/// Provider connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
  #[serde(default)]
  pub kind: ProviderKind,
  /// Chart WebSocket URL.
  #[serde(default = "default_ws_url")]
  pub ws_url: String,
  /// `Origin` header sent on the handshake.
  #[serde(default = "default_origin")]
  pub origin: String,
  /// History bars requested per chart session.
  #[serde(default = "default_bars_per_session")]
  pub bars_per_session: u32,
  /// Buffered bar batches per session before drops.
  #[serde(default = "default_channel_capacity")]
  pub channel_capacity: usize,
  /// Synthetic provider tick period.
  #[serde(default = "default_tick_interval")]
  pub tick_interval_ms: u64,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    Self {
      kind: ProviderKind::default(),
      ws_url: default_ws_url(),
      origin: default_origin(),
      bars_per_session: default_bars_per_session(),
      channel_capacity: default_channel_capacity(),
      tick_interval_ms: default_tick_interval(),
    }
  }
}

/// Ticker synthesis for symbols outside the fixed table.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolsConfig {
  #[serde(default = "default_exchange")]
  pub exchange: String,
  #[serde(default = "default_quote")]
  pub quote: String,
  /// Extra `SYMBOL = "EXCHANGE:TICKER"` entries layered over the table.
  #[serde(default)]
  pub overrides: HashMap<String, String>,
}

impl Default for SymbolsConfig {
  fn default() -> Self {
    Self {
      exchange: default_exchange(),
      quote: default_quote(),
      overrides: HashMap::new(),
    }
  }
}

impl SymbolsConfig {
  pub fn mapper(&self) -> SymbolMapper {
    SymbolMapper::new(&self.exchange, &self.quote, self.overrides.clone())
  }
}

/// Random-walk configuration. Defaults mirror `SyntheticParams::default`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyntheticConfig {
  #[serde(default = "default_start_price_min")]
  pub start_price_min: f64,
  #[serde(default = "default_start_price_max")]
  pub start_price_max: f64,
  /// Perturbation width per timeframe `[1D, 1W, 1M, 1Y]`.
  #[serde(default = "default_volatility")]
  pub volatility: [f64; 4],
  #[serde(default = "default_wick_jitter")]
  pub wick_jitter: f64,
  #[serde(default = "default_volume_min")]
  pub volume_min: f64,
  #[serde(default = "default_volume_max")]
  pub volume_max: f64,
}

impl Default for SyntheticConfig {
  fn default() -> Self {
    Self {
      start_price_min: default_start_price_min(),
      start_price_max: default_start_price_max(),
      volatility: default_volatility(),
      wick_jitter: default_wick_jitter(),
      volume_min: default_volume_min(),
      volume_max: default_volume_max(),
    }
  }
}

impl SyntheticConfig {
  pub const fn params(&self) -> SyntheticParams {
    SyntheticParams {
      start_price_min: self.start_price_min,
      start_price_max: self.start_price_max,
      volatility: self.volatility,
      wick_jitter: self.wick_jitter,
      volume_min: self.volume_min,
      volume_max: self.volume_max,
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve /metrics, /live and /ready.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
    }
  }
}

/// One chart subscribed at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistEntry {
  /// Canonical symbol, e.g. `"BTC"` or `"Bitcoin (BTC)"`.
  pub symbol: String,
  /// UI range label; unknown labels fall back to `1D`.
  #[serde(default = "default_timeframe_label")]
  pub timeframe: String,
  #[serde(default)]
  pub kind: SeriesKind,
}

impl WatchlistEntry {
  pub fn timeframe(&self) -> Timeframe {
    Timeframe::from_label_or_default(&self.timeframe)
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_snapshot_wait() -> u64 {
  5_000
}

fn default_max_series_len() -> usize {
  DEFAULT_MAX_SERIES_LEN
}

fn default_ws_url() -> String {
  "wss://data.tradingview.com/socket.io/websocket".to_string()
}

fn default_origin() -> String {
  "https://www.tradingview.com".to_string()
}

fn default_bars_per_session() -> u32 {
  300
}

fn default_channel_capacity() -> usize {
  64
}

fn default_tick_interval() -> u64 {
  1_000
}

fn default_exchange() -> String {
  DEFAULT_EXCHANGE.to_string()
}

fn default_quote() -> String {
  DEFAULT_QUOTE.to_string()
}

fn default_start_price_min() -> f64 {
  SyntheticParams::default().start_price_min
}

fn default_start_price_max() -> f64 {
  SyntheticParams::default().start_price_max
}

fn default_volatility() -> [f64; 4] {
  SyntheticParams::default().volatility
}

fn default_wick_jitter() -> f64 {
  SyntheticParams::default().wick_jitter
}

fn default_volume_min() -> f64 {
  SyntheticParams::default().volume_min
}

fn default_volume_max() -> f64 {
  SyntheticParams::default().volume_max
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_timeframe_label() -> String {
  Timeframe::Day.label().to_string()
}
