//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, ProviderKind};

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    provider = ?config.provider.kind,
    watchlist = config.watchlist.len(),
    metrics = config.metrics.enabled,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
///
/// # Errors
/// Fails on TOML syntax errors or validation violations.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty identity and endpoint strings
/// - Positive capacities and intervals
/// - Well-formed synthetic price/volume bands
/// - Non-empty watchlist symbols
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(!config.feed.name.is_empty(), "feed.name must not be empty");
  anyhow::ensure!(
    config.feed.max_series_len > 0,
    "feed.max_series_len must be positive"
  );

  // Provider validation
  let provider = &config.provider;
  if provider.kind == ProviderKind::Tradingview {
    anyhow::ensure!(
      provider.ws_url.starts_with("ws://") || provider.ws_url.starts_with("wss://"),
      "provider.ws_url must be a ws:// or wss:// URL, got {}",
      provider.ws_url
    );
    anyhow::ensure!(
      provider.bars_per_session > 0,
      "provider.bars_per_session must be positive"
    );
  }
  anyhow::ensure!(
    provider.channel_capacity > 0,
    "provider.channel_capacity must be positive"
  );
  anyhow::ensure!(
    provider.tick_interval_ms > 0,
    "provider.tick_interval_ms must be positive"
  );

  // Symbol validation
  anyhow::ensure!(
    !config.symbols.exchange.is_empty() && !config.symbols.quote.is_empty(),
    "symbols.exchange and symbols.quote must not be empty"
  );

  // Synthetic validation
  let synthetic = &config.synthetic;
  anyhow::ensure!(
    synthetic.start_price_min > 0.0 && synthetic.start_price_min < synthetic.start_price_max,
    "synthetic start price band must satisfy 0 < min < max, got [{}, {})",
    synthetic.start_price_min,
    synthetic.start_price_max
  );
  anyhow::ensure!(
    synthetic.volume_min > 0.0 && synthetic.volume_min < synthetic.volume_max,
    "synthetic volume band must satisfy 0 < min < max, got [{}, {})",
    synthetic.volume_min,
    synthetic.volume_max
  );
  anyhow::ensure!(
    synthetic.volatility.iter().all(|v| v.is_finite() && *v >= 0.0),
    "synthetic volatility entries must be finite and non-negative"
  );
  anyhow::ensure!(
    synthetic.wick_jitter >= 0.0,
    "synthetic.wick_jitter must be non-negative"
  );

  // Watchlist validation
  for (i, entry) in config.watchlist.iter().enumerate() {
    anyhow::ensure!(
      !entry.symbol.trim().is_empty(),
      "Watchlist entry {} has empty symbol",
      i
    );
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::series::SeriesKind;
  use crate::domain::timeframe::Timeframe;

  const MINIMAL: &str = r#"
[feed]
name = "chart-feed"
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = parse_config(MINIMAL).unwrap();
    assert_eq!(config.feed.log_level, "info");
    assert_eq!(config.provider.kind, ProviderKind::Tradingview);
    assert_eq!(config.symbols.exchange, "BINANCE");
    assert_eq!(config.synthetic.volatility, [100.0, 300.0, 800.0, 2000.0]);
    assert!(config.watchlist.is_empty());
  }

  #[test]
  fn test_full_config() {
    let toml = r#"
[feed]
name = "chart-feed"
snapshot_wait_ms = 250

[provider]
kind = "synthetic"
tick_interval_ms = 50

[symbols]
exchange = "COINBASE"
quote = "USD"
overrides = { PEPE = "BINANCE:PEPEUSDT" }

[[watchlist]]
symbol = "Bitcoin (BTC)"
timeframe = "1W"
kind = "ohlcv"

[[watchlist]]
symbol = "ETH"
timeframe = "5Y"
"#;
    let config = parse_config(toml).unwrap();
    assert_eq!(config.provider.kind, ProviderKind::Synthetic);
    assert_eq!(config.feed.options().snapshot_wait.as_millis(), 250);

    let mapper = config.symbols.mapper();
    assert_eq!(mapper.map_symbol("PEPE"), "BINANCE:PEPEUSDT");
    assert_eq!(mapper.map_symbol("ZZZ"), "COINBASE:ZZZUSD");

    assert_eq!(config.watchlist[0].timeframe(), Timeframe::Week);
    assert_eq!(config.watchlist[0].kind, SeriesKind::Ohlcv);
    assert_eq!(config.watchlist[1].timeframe(), Timeframe::Day);
    assert_eq!(config.watchlist[1].kind, SeriesKind::Simple);
  }

  #[test]
  fn test_rejects_inverted_price_band() {
    let toml = format!("{MINIMAL}\n[synthetic]\nstart_price_min = 500.0\nstart_price_max = 100.0\n");
    let err = parse_config(&toml).unwrap_err();
    assert!(err.to_string().contains("start price band"));
  }

  #[test]
  fn test_rejects_non_websocket_url() {
    let toml = format!("{MINIMAL}\n[provider]\nws_url = \"https://example.com\"\n");
    assert!(parse_config(&toml).is_err());
  }

  #[test]
  fn test_rejects_empty_watchlist_symbol() {
    let toml = format!("{MINIMAL}\n[[watchlist]]\nsymbol = \"  \"\n");
    assert!(parse_config(&toml).is_err());
  }
}
