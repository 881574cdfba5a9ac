//! Provider bar payload → canonical `PricePoint`s.
//!
//! The provider pushes `{ "bars": [ { time, open, high, low, close, volume } ] }`
//! where `time` is in seconds. A bare array of bars is accepted too.
//! Anything else (missing, `null`, not a sequence) yields an empty series.
//! Provider order is kept as-is; callers validate ordering.

use serde_json::Value;
use tracing::debug;

use super::series::PricePoint;

/// Normalize a provider payload. Never fails.
pub fn normalize_bars(payload: Option<&Value>) -> Vec<PricePoint> {
    let Some(payload) = payload else {
        return Vec::new();
    };

    let bars = match payload {
        Value::Array(bars) => bars,
        Value::Object(map) => match map.get("bars") {
            Some(Value::Array(bars)) => bars,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    bars.iter()
        .enumerate()
        .filter_map(|(idx, bar)| {
            let point = normalize_bar(bar);
            if point.is_none() {
                debug!(index = idx, "Skipping malformed provider bar");
            }
            point
        })
        .collect()
}

/// Map one provider bar. `None` when `time` or `close` is missing.
fn normalize_bar(bar: &Value) -> Option<PricePoint> {
    let close = bar.get("close")?.as_f64()?;
    let timestamp = seconds_to_millis(bar.get("time")?)?;
    let field = |name: &str| bar.get(name).and_then(Value::as_f64);

    Some(PricePoint {
        timestamp,
        price: close,
        open: field("open"),
        high: field("high"),
        low: field("low"),
        close: Some(close),
        volume: field("volume"),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn seconds_to_millis(time: &Value) -> Option<i64> {
    if let Some(secs) = time.as_i64() {
        return secs.checked_mul(1000);
    }
    let secs = time.as_f64()?;
    secs.is_finite().then(|| (secs * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_missing_or_non_array_is_empty() {
        assert!(normalize_bars(None).is_empty());
        assert!(normalize_bars(Some(&Value::Null)).is_empty());
        assert!(normalize_bars(Some(&json!({}))).is_empty());
        assert!(normalize_bars(Some(&json!({ "bars": "nope" }))).is_empty());
        assert!(normalize_bars(Some(&json!(42))).is_empty());
    }

    #[test]
    fn test_time_seconds_become_millis() {
        let payload = json!({
            "bars": [
                { "time": 1_700_000_000, "open": 1.0, "high": 3.0, "low": 0.5, "close": 2.0, "volume": 10.0 }
            ]
        });
        let points = normalize_bars(Some(&payload));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp, 1_700_000_000_000);
        assert_eq!(points[0].price, 2.0);
        assert_eq!(points[0].close, Some(2.0));
        assert_eq!(points[0].open, Some(1.0));
        assert_eq!(points[0].high, Some(3.0));
        assert_eq!(points[0].low, Some(0.5));
        assert_eq!(points[0].volume, Some(10.0));
    }

    #[test]
    fn test_bare_array_and_order_preserved() {
        let payload = json!([
            { "time": 20, "close": 2.0 },
            { "time": 10, "close": 1.0 }
        ]);
        let points = normalize_bars(Some(&payload));
        assert_eq!(
            points.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
            vec![20_000, 10_000]
        );
        assert_eq!(points[0].volume, None);
    }

    #[test]
    fn test_malformed_bars_skipped() {
        let payload = json!({
            "bars": [
                { "time": 1, "close": 1.0 },
                { "time": 2 },
                { "close": 3.0 },
                "garbage",
                { "time": 4.5, "close": 4.0 }
            ]
        });
        let points = normalize_bars(Some(&payload));
        assert_eq!(
            points.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
            vec![1_000, 4_500]
        );
    }

    #[test]
    fn test_normalize_is_idempotent_on_empty() {
        let empty = json!({ "bars": [] });
        assert_eq!(normalize_bars(Some(&empty)), normalize_bars(Some(&empty)));
        assert!(normalize_bars(Some(&empty)).is_empty());
    }
}
