//! Market Data Provider Adapters - Chart Streaming
//!
//! Implementations of the `MarketDataProvider` port:
//! - TradingView: public chart WebSocket (`~m~` framed JSON)
//! - Synthetic: in-process random walk for offline runs and tests

pub mod codec;
pub mod synthetic;
pub mod tradingview;

pub use synthetic::SyntheticProvider;
pub use tradingview::TradingViewProvider;
