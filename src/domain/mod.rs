//! Domain layer - Pure feed logic and canonical records.
//!
//! Symbol/timeframe mapping, bar normalization, synthetic series
//! generation and price summaries. No I/O and no async here
//! (hexagonal architecture inner ring); everything is testable in isolation.

pub mod normalizer;
pub mod series;
pub mod symbol;
pub mod synthetic;
pub mod timeframe;

// Re-export core types for convenience
pub use normalizer::normalize_bars;
pub use series::{PricePoint, PriceSummary, SeriesKind, SeriesSource};
pub use symbol::{SymbolMapper, canonical_symbol};
pub use synthetic::{SyntheticParams, SyntheticSeriesGenerator};
pub use timeframe::{Timeframe, map_timeframe};
