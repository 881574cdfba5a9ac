//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify that the generator, normalizer, summary and
//! symbol mapping keep their invariants across random inputs.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;

use crypto_chart_feed::domain::normalizer::normalize_bars;
use crypto_chart_feed::domain::series::{
    PricePoint, PriceSummary, SeriesKind, is_strictly_ascending, merge_into,
};
use crypto_chart_feed::domain::symbol::SymbolMapper;
use crypto_chart_feed::domain::synthetic::SyntheticSeriesGenerator;
use crypto_chart_feed::domain::timeframe::Timeframe;

fn timeframe() -> impl Strategy<Value = Timeframe> {
    prop::sample::select(Timeframe::ALL.to_vec())
}

// ── Synthetic Generator Properties ──────────────────────────

proptest! {
    /// Series shape: count, contiguous spacing, last point one step before now.
    #[test]
    fn generated_series_shape(
        seed in any::<u64>(),
        tf in timeframe(),
        now in 1_600_000_000_000i64..1_900_000_000_000,
    ) {
        let generator = SyntheticSeriesGenerator::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let series = generator.generate_with_rng(&mut rng, tf, SeriesKind::Simple, now);

        prop_assert_eq!(series.len(), tf.point_count());
        prop_assert!(is_strictly_ascending(&series));
        prop_assert!(series.windows(2).all(|w| w[1].timestamp - w[0].timestamp == tf.spacing_ms()));
        prop_assert_eq!(series[series.len() - 1].timestamp, now - tf.spacing_ms());
        prop_assert!(series.iter().all(|p| !p.has_ohlc()));
    }

    /// Candles always satisfy the OHLC ordering and carry positive volume.
    #[test]
    fn generated_candles_valid(seed in any::<u64>(), tf in timeframe()) {
        let generator = SyntheticSeriesGenerator::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let series = generator.generate_with_rng(&mut rng, tf, SeriesKind::Ohlcv, 1_700_000_000_000);

        for point in &series {
            prop_assert!(point.is_valid(), "invalid candle {point:?}");
            prop_assert!(point.volume.unwrap_or_default() > 0.0);
            prop_assert_eq!(point.close, Some(point.price));
        }
        prop_assert!(series.windows(2).all(|w| w[1].open == w[0].close));
    }
}

// ── Normalizer Properties ───────────────────────────────────

proptest! {
    /// `time` in seconds always lands as milliseconds, order untouched.
    #[test]
    fn normalizer_scales_time(
        times in prop::collection::vec(0i64..4_000_000_000, 0..50),
        close in 0.01f64..1e6,
    ) {
        let bars: Vec<_> = times.iter().map(|t| json!({ "time": t, "close": close })).collect();
        let points = normalize_bars(Some(&json!({ "bars": bars })));

        prop_assert_eq!(points.len(), times.len());
        for (point, t) in points.iter().zip(&times) {
            prop_assert_eq!(point.timestamp, t * 1000);
            prop_assert_eq!(point.price, close);
        }
    }
}

// ── Summary & Merge Properties ──────────────────────────────

proptest! {
    /// change_absolute = last - first, change_percent relative to first.
    #[test]
    fn summary_matches_endpoints(
        prices in prop::collection::vec(1.0f64..1e5, 2..100),
    ) {
        let points: Vec<_> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| PricePoint::simple(i as i64, *p))
            .collect();
        let summary = PriceSummary::try_from_points(&points).unwrap();
        let first = prices[0];
        let last = prices[prices.len() - 1];

        prop_assert_eq!(summary.current_price, last);
        prop_assert!((summary.change_absolute - (last - first)).abs() < 1e-6);
        prop_assert!((summary.change_percent - (last - first) / first * 100.0).abs() < 1e-6);
    }

    /// Merging ascending batches keeps the series ascending and capped.
    #[test]
    fn merge_keeps_series_ascending(
        steps in prop::collection::vec((0i64..3, 1.0f64..100.0), 1..200),
        max_len in 1usize..64,
    ) {
        let mut series = Vec::new();
        let mut t = 0;
        for (gap, price) in steps {
            t += gap;
            merge_into(&mut series, &[PricePoint::simple(t, price)], max_len);
            prop_assert!(is_strictly_ascending(&series));
            prop_assert!(series.len() <= max_len);
        }
    }
}

// ── Symbol Mapper Properties ────────────────────────────────

proptest! {
    /// Any symbol maps to a non-empty ticker containing it (uppercased).
    #[test]
    fn unknown_symbols_synthesize_ticker(symbol in "[a-zA-Z]{2,8}") {
        let mapper = SymbolMapper::default();
        let ticker = mapper.map_symbol(&symbol);
        prop_assert!(!ticker.is_empty());
        if !mapper.is_known(&symbol) {
            prop_assert_eq!(ticker, format!("BINANCE:{}USDT", symbol.to_uppercase()));
        }
    }

    /// Display strings and bare symbols resolve identically.
    #[test]
    fn display_string_matches_bare(name in "[A-Za-z]{3,12}", symbol in "[A-Z]{2,6}") {
        let mapper = SymbolMapper::default();
        prop_assert_eq!(
            mapper.map_symbol(&format!("{name} ({symbol})")),
            mapper.map_symbol(&symbol)
        );
    }
}
