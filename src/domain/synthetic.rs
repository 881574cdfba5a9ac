//! Synthetic OHLCV series for when no live feed is configured or reachable.
//!
//! Produces a directed random walk: one starting price drawn per series,
//! then each point perturbs the previous one by a uniform draw whose width
//! grows with the timeframe. Output is not reproducible unless the caller
//! supplies a seeded RNG; only the structural invariants are guaranteed:
//! contiguous ascending timestamps, OHLC ordering, positive volume.

use chrono::Utc;
use rand::Rng;

use super::series::{PricePoint, SeriesKind};
use super::timeframe::Timeframe;

/// Tunables for the random walk.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticParams {
    /// Lower bound of the starting price draw.
    pub start_price_min: f64,
    /// Upper bound (exclusive) of the starting price draw.
    pub start_price_max: f64,
    /// Full width of the per-step perturbation, per timeframe `[1D, 1W, 1M, 1Y]`.
    pub volatility: [f64; 4],
    /// Upper bound of the extra wick added above/below the candle body.
    pub wick_jitter: f64,
    /// Lower bound of the volume draw (must be positive).
    pub volume_min: f64,
    /// Upper bound (exclusive) of the volume draw.
    pub volume_max: f64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            start_price_min: 45_000.0,
            start_price_max: 50_000.0,
            volatility: [100.0, 300.0, 800.0, 2000.0],
            wick_jitter: 200.0,
            volume_min: 500.0,
            volume_max: 1500.0,
        }
    }
}

impl SyntheticParams {
    /// Perturbation width for a timeframe.
    pub const fn volatility_for(&self, timeframe: Timeframe) -> f64 {
        match timeframe {
            Timeframe::Day => self.volatility[0],
            Timeframe::Week => self.volatility[1],
            Timeframe::Month => self.volatility[2],
            Timeframe::Year => self.volatility[3],
        }
    }
}

/// Uniform draw in `[lo, hi)`; degenerate ranges collapse to `lo`.
fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo { rng.gen_range(lo..hi) } else { lo }
}

/// Random-walk series generator.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSeriesGenerator {
    params: SyntheticParams,
}

impl SyntheticSeriesGenerator {
    pub const fn new(params: SyntheticParams) -> Self {
        Self { params }
    }

    pub const fn params(&self) -> &SyntheticParams {
        &self.params
    }

    /// Generate a series ending one spacing unit before the current time.
    pub fn generate(&self, timeframe: Timeframe, kind: SeriesKind) -> Vec<PricePoint> {
        let now_ms = Utc::now().timestamp_millis();
        self.generate_with_rng(&mut rand::thread_rng(), timeframe, kind, now_ms)
    }

    /// Generate a series ending at `now_ms - spacing` with a caller RNG.
    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        timeframe: Timeframe,
        kind: SeriesKind,
        now_ms: i64,
    ) -> Vec<PricePoint> {
        let count = timeframe.point_count();
        let spacing = timeframe.spacing_ms();
        let mut walk = self.starting_price(rng);

        (0..count)
            .map(|i| {
                let steps_back = i64::try_from(count - i).unwrap_or(i64::MAX);
                let timestamp = now_ms.saturating_sub(steps_back.saturating_mul(spacing));
                let point = match kind {
                    SeriesKind::Simple => {
                        walk += self.perturbation(rng, timeframe);
                        PricePoint::simple(timestamp, walk)
                    }
                    SeriesKind::Ohlcv => self.next_bar(rng, timeframe, walk, timestamp),
                };
                walk = point.price;
                point
            })
            .collect()
    }

    /// Draw a starting price from the configured band.
    pub fn starting_price<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        uniform(rng, self.params.start_price_min, self.params.start_price_max)
    }

    /// One candle continuing the walk from `prev_close`.
    pub fn next_bar<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        timeframe: Timeframe,
        prev_close: f64,
        timestamp: i64,
    ) -> PricePoint {
        let open = prev_close;
        let close = open + self.perturbation(rng, timeframe);
        let high = open.max(close) + uniform(rng, 0.0, self.params.wick_jitter);
        let low = open.min(close) - uniform(rng, 0.0, self.params.wick_jitter);
        let volume = uniform(rng, self.params.volume_min, self.params.volume_max);

        PricePoint::ohlcv(timestamp, open, high, low, close, volume)
    }

    fn perturbation<R: Rng + ?Sized>(&self, rng: &mut R, timeframe: Timeframe) -> f64 {
        let half = self.params.volatility_for(timeframe) / 2.0;
        uniform(rng, -half, half)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::domain::series::is_strictly_ascending;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_point_counts_and_spacing() {
        let generator = SyntheticSeriesGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);

        for tf in Timeframe::ALL {
            for kind in [SeriesKind::Simple, SeriesKind::Ohlcv] {
                let series = generator.generate_with_rng(&mut rng, tf, kind, NOW);
                assert_eq!(series.len(), tf.point_count(), "{tf} {kind:?}");
                assert!(is_strictly_ascending(&series));
                assert!(
                    series
                        .windows(2)
                        .all(|w| w[1].timestamp - w[0].timestamp == tf.spacing_ms())
                );
                assert_eq!(series.last().unwrap().timestamp, NOW - tf.spacing_ms());
            }
        }
    }

    #[test]
    fn test_ohlcv_invariants_and_walk_continuity() {
        let generator = SyntheticSeriesGenerator::default();
        let mut rng = StdRng::seed_from_u64(42);
        let series = generator.generate_with_rng(&mut rng, Timeframe::Year, SeriesKind::Ohlcv, NOW);

        for point in &series {
            assert!(point.is_valid(), "OHLC ordering violated: {point:?}");
            assert!(point.volume.unwrap() > 0.0);
            assert_eq!(point.close, Some(point.price));
        }
        for pair in series.windows(2) {
            assert_eq!(pair[1].open, pair[0].close);
        }

        let first_open = series[0].open.unwrap();
        assert!((45_000.0..50_000.0).contains(&first_open));
    }

    #[test]
    fn test_simple_series_has_no_ohlcv() {
        let generator = SyntheticSeriesGenerator::default();
        let series = generator.generate(Timeframe::Day, SeriesKind::Simple);
        assert!(series.iter().all(|p| !p.has_ohlc() && p.volume.is_none()));
    }

    #[test]
    fn test_steps_bounded_by_volatility() {
        let generator = SyntheticSeriesGenerator::default();
        let mut rng = StdRng::seed_from_u64(3);
        let series = generator.generate_with_rng(&mut rng, Timeframe::Day, SeriesKind::Simple, NOW);
        let half = generator.params().volatility_for(Timeframe::Day) / 2.0;
        assert!(series.windows(2).all(|w| (w[1].price - w[0].price).abs() <= half));
    }

    #[test]
    fn test_degenerate_bands_do_not_panic() {
        let generator = SyntheticSeriesGenerator::new(SyntheticParams {
            start_price_min: 100.0,
            start_price_max: 100.0,
            volatility: [0.0; 4],
            wick_jitter: 0.0,
            volume_min: 1.0,
            volume_max: 1.0,
        });
        let series = generator.generate(Timeframe::Month, SeriesKind::Ohlcv);
        assert!(series.iter().all(|p| p.price == 100.0 && p.volume == Some(1.0)));
    }
}
