//! Chart timeframes and their provider tokens.
//!
//! The UI hands us one of four range labels. Each label maps to a provider
//! resolution token and to the shape of a synthetic series (point count and
//! spacing). Unknown labels deliberately fall back to `1D` so a newer UI
//! can send ranges this layer does not know yet without breaking the chart.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Application-level chart range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1D")]
    Day,
    #[serde(rename = "1W")]
    Week,
    #[serde(rename = "1M")]
    Month,
    #[serde(rename = "1Y")]
    Year,
}

impl Timeframe {
    /// All supported timeframes, shortest first.
    pub const ALL: [Self; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    /// UI label (`1D`, `1W`, `1M`, `1Y`).
    pub const fn label(self) -> &'static str {
        match self {
            Self::Day => "1D",
            Self::Week => "1W",
            Self::Month => "1M",
            Self::Year => "1Y",
        }
    }

    /// Parse a UI label, falling back to `Day` for anything unrecognized.
    pub fn from_label_or_default(label: &str) -> Self {
        match label.trim() {
            "1W" => Self::Week,
            "1M" => Self::Month,
            "1Y" => Self::Year,
            _ => Self::Day,
        }
    }

    /// Provider resolution token for this range.
    pub const fn provider_token(self) -> &'static str {
        match self {
            Self::Day => "1",
            Self::Week => "1W",
            Self::Month => "1M",
            Self::Year => "12M",
        }
    }

    /// Inverse of [`Self::provider_token`]; unknown tokens map to `Day`.
    pub fn from_provider_token(token: &str) -> Self {
        match token {
            "1W" => Self::Week,
            "1M" => Self::Month,
            "12M" => Self::Year,
            _ => Self::Day,
        }
    }

    /// Number of points in a synthetic series.
    pub const fn point_count(self) -> usize {
        match self {
            Self::Day => 24,
            Self::Week => 168,
            Self::Month => 30,
            Self::Year => 365,
        }
    }

    /// Nominal spacing between consecutive points, in milliseconds.
    pub const fn spacing_ms(self) -> i64 {
        match self {
            Self::Day | Self::Week => HOUR_MS,
            Self::Month | Self::Year => DAY_MS,
        }
    }

    /// Spacing as a `Duration`.
    #[allow(clippy::cast_sign_loss)]
    pub const fn spacing(self) -> Duration {
        Duration::from_millis(self.spacing_ms() as u64)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a raw UI label straight to a provider token.
///
/// Unrecognized labels produce the `1D` token.
pub fn map_timeframe(label: &str) -> &'static str {
    Timeframe::from_label_or_default(label).provider_token()
}
