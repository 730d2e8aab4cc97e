//! Benchmarks for the scan pipeline.

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use setupscan::prelude::*;

/// Generate realistic bars for one ticker
fn generate_bars(ticker: &str, n: usize, seed: usize) -> Vec<PriceBar> {
  let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + seed * 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3 + seed) % 10) as f64 / 5.0;

    let o = price;
    let c = (price + change).max(1.0);
    let h = o.max(c) + volatility * 0.5;
    let l = (o.min(c) - volatility * 0.5).max(0.01);

    bars.push(PriceBar {
      date: start + Duration::days(i as i64),
      ticker: ticker.to_string(),
      group: Group::Untagged,
      open: o,
      high: h,
      low: l,
      close: c,
      volume: Some(1000.0),
    });
    price = c;
  }

  bars
}

fn generate_table(tickers: usize, n: usize) -> PriceTable {
  let bars = (0..tickers)
    .flat_map(|t| generate_bars(&format!("SYM{t}"), n, t))
    .collect();
  PriceTable::new(bars).unwrap()
}

fn bench_indicators(c: &mut Criterion) {
  let bars = generate_bars("SYM", 1000, 0);
  let cfg = IndicatorConfig::default();

  c.bench_function("indicators_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(IndicatorFrame::compute(black_box(&bars), &cfg));
    })
  });
}

fn bench_scan_series(c: &mut Criterion) {
  let table = generate_table(1, 1000);
  let engine = EngineBuilder::new().build().unwrap();
  let series = &table.series()[0];

  c.bench_function("scan_series_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(engine.scan_series(black_box(series)));
    })
  });
}

fn bench_run_scaling(c: &mut Criterion) {
  let engine = EngineBuilder::new().scope(EvaluationScope::All).build().unwrap();

  let mut group = c.benchmark_group("run_tickers");

  for tickers in [1, 10, 50, 200].iter() {
    let table = generate_table(*tickers, 500);

    group.bench_with_input(BenchmarkId::new("static", tickers), tickers, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.run(black_box(&table)));
      })
    });
  }

  group.finish();
}

fn bench_empirical(c: &mut Criterion) {
  let table = generate_table(50, 500);
  let engine = EngineBuilder::new()
    .grading(GradingStrategy::Empirical(EmpiricalConfig::default()))
    .scope(EvaluationScope::All)
    .build()
    .unwrap();

  c.bench_function("run_empirical_50_tickers", |b| {
    b.iter(|| {
      let _ = black_box(engine.run(black_box(&table)));
    })
  });
}

fn bench_backtest(c: &mut Criterion) {
  let table = generate_table(50, 500);
  let engine = EngineBuilder::new().build().unwrap();

  c.bench_function("backtest_50_tickers", |b| {
    b.iter(|| {
      let _ = black_box(engine.backtest(black_box(&table)));
    })
  });
}

criterion_group!(
  benches,
  bench_indicators,
  bench_scan_series,
  bench_run_scaling,
  bench_empirical,
  bench_backtest,
);

criterion_main!(benches);
