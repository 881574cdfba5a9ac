//! Canonical time-series records.
//!
//! Every price series that leaves the feed layer is a `Vec<PricePoint>`
//! built by the normalizer or the synthetic generator. Untyped provider
//! payloads never cross this boundary.

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};

/// One sample of a price series.
///
/// `price` is always the last/close value. OHLCV fields are present for
/// candlestick series and absent for simple line series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Last/close price.
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl PricePoint {
    /// A line-chart point carrying only a price.
    pub const fn simple(timestamp: i64, price: f64) -> Self {
        Self {
            timestamp,
            price,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    /// A candlestick point; `price` mirrors `close`.
    pub const fn ohlcv(
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            price: close,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }

    /// Whether this point carries open/high/low/close.
    pub const fn has_ohlc(&self) -> bool {
        self.open.is_some() || self.high.is_some() || self.low.is_some() || self.close.is_some()
    }

    /// OHLC invariant: all-or-nothing, and `low ≤ open,close ≤ high`.
    pub fn is_valid(&self) -> bool {
        if !self.has_ohlc() {
            return true;
        }
        match (self.open, self.high, self.low, self.close) {
            (Some(o), Some(h), Some(l), Some(c)) => l <= o.min(c) && o.max(c) <= h,
            _ => false,
        }
    }

    /// Keep a valid point, demote one with incomplete OHLC to a simple
    /// point, reject one whose OHLC values are out of order.
    pub fn sanitized(self) -> Option<Self> {
        if self.is_valid() {
            return Some(self);
        }
        let complete = self.open.is_some()
            && self.high.is_some()
            && self.low.is_some()
            && self.close.is_some();
        (!complete).then(|| self.to_simple())
    }

    /// Drop the OHLCV fields, keeping timestamp and price.
    #[must_use]
    pub const fn to_simple(self) -> Self {
        Self::simple(self.timestamp, self.price)
    }
}

/// Whether timestamps strictly increase across the slice.
pub fn is_strictly_ascending(points: &[PricePoint]) -> bool {
    points.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

/// Which fields a series carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    /// Line chart: `price` only.
    #[default]
    Simple,
    /// Candlestick chart: full OHLCV.
    Ohlcv,
}

/// Where a snapshot's series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesSource {
    Live,
    Synthetic,
}

impl SeriesSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Synthetic => "synthetic",
        }
    }
}

/// Derived headline numbers for a series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PriceSummary {
    /// Price of the last point.
    pub current_price: f64,
    /// Last price minus first price.
    pub change_absolute: f64,
    /// `change_absolute / first_price * 100`.
    pub change_percent: f64,
}

impl PriceSummary {
    /// Compute the summary, failing on fewer than two points or a zero
    /// first price.
    pub fn try_from_points(points: &[PricePoint]) -> FeedResult<Self> {
        let insufficient = FeedError::InsufficientData {
            points: points.len(),
        };
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(insufficient);
        };
        if points.len() < 2 || first.price == 0.0 {
            return Err(insufficient);
        }

        let change_absolute = last.price - first.price;
        Ok(Self {
            current_price: last.price,
            change_absolute,
            change_percent: change_absolute / first.price * 100.0,
        })
    }

    /// Compute the summary, recovering to a zero-change default.
    ///
    /// `current_price` still reflects the last point when there is one.
    pub fn from_points(points: &[PricePoint]) -> Self {
        Self::try_from_points(points).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "Price summary defaulted to zero change");
            Self {
                current_price: points.last().map_or(0.0, |p| p.price),
                ..Self::default()
            }
        })
    }
}

/// Merge a batch into a rolling series.
///
/// A point whose timestamp matches the tail replaces it, newer points are
/// appended, and anything older than the tail is ignored. The series is
/// capped at `max_len` by dropping from the front.
pub fn merge_into(series: &mut Vec<PricePoint>, batch: &[PricePoint], max_len: usize) {
    for point in batch {
        match series.last_mut() {
            Some(last) if last.timestamp == point.timestamp => *last = *point,
            Some(last) if last.timestamp > point.timestamp => {
                if let Ok(idx) = series.binary_search_by_key(&point.timestamp, |p| p.timestamp) {
                    series[idx] = *point;
                }
            }
            _ => series.push(*point),
        }
    }

    if series.len() > max_len {
        let excess = series.len() - max_len;
        series.drain(..excess);
    }
}
