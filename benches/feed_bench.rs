//! Feed Benchmarks — Hot-Path Performance Validation
//!
//! Benchmarks the domain functions that run on every provider push and
//! every synthetic snapshot.
//!
//! Run with: cargo bench --bench feed_bench

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};

use crypto_chart_feed::domain::normalizer::normalize_bars;
use crypto_chart_feed::domain::series::{PricePoint, SeriesKind, merge_into};
use crypto_chart_feed::domain::synthetic::SyntheticSeriesGenerator;
use crypto_chart_feed::domain::timeframe::Timeframe;

fn history_payload(len: i64) -> Value {
    let bars: Vec<Value> = (0..len)
        .map(|i| {
            json!({
                "time": 1_700_000_000 + i * 60,
                "open": 100.0, "high": 101.0, "low": 99.0, "close": 100.5, "volume": 12.0
            })
        })
        .collect();
    json!({ "bars": bars })
}

/// Benchmark normalizing a full 300-bar history push.
fn bench_normalize_history(c: &mut Criterion) {
    let payload = history_payload(300);

    c.bench_function("normalize_bars_300", |b| {
        b.iter(|| {
            let _points = normalize_bars(Some(black_box(&payload)));
        });
    });
}

/// Benchmark the common single-bar incremental update.
fn bench_normalize_single(c: &mut Criterion) {
    let payload = history_payload(1);

    c.bench_function("normalize_bars_single", |b| {
        b.iter(|| {
            let _points = normalize_bars(Some(black_box(&payload)));
        });
    });
}

/// Benchmark merging one update into a full rolling series.
fn bench_merge_tail(c: &mut Criterion) {
    let base: Vec<PricePoint> = (0..300).map(|i| PricePoint::simple(i, 100.0)).collect();
    let update = [PricePoint::simple(300, 101.0)];

    c.bench_function("merge_into_300", |b| {
        b.iter(|| {
            let mut series = base.clone();
            merge_into(&mut series, black_box(&update), 300);
        });
    });
}

/// Benchmark synthetic candle generation for the longest range.
fn bench_generate(c: &mut Criterion) {
    let generator = SyntheticSeriesGenerator::default();
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("generate_ohlcv_1y", |b| {
        b.iter(|| {
            let _series = generator.generate_with_rng(
                &mut rng,
                black_box(Timeframe::Year),
                SeriesKind::Ohlcv,
                1_700_000_000_000,
            );
        });
    });
}

criterion_group!(
    benches,
    bench_normalize_history,
    bench_normalize_single,
    bench_merge_tail,
    bench_generate,
);
criterion_main!(benches);
