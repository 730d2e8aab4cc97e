//! Historical quality backtest
//!
//! Replays the detect/gate stages over every date of every ticker and scores
//! each gated candidate by its forward returns and by whether the target or
//! the stop was touched within the hit window. Daily bars cannot order a
//! same-bar target and stop touch, so both flags can be set.

use std::collections::BTreeMap;
use std::io::Write;

use rayon::prelude::*;

use crate::{
    detectors::Pattern,
    grading::forward_return,
    pipeline::{GatedCandidate, ScanEngine},
    table::{fmt_bool, fmt_num, fmt_opt, PriceTable, TickerSeries},
    Result, Side,
};

/// Forward performance of one gated candidate
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub setup: GatedCandidate,
    /// Direction-adjusted return per configured horizon
    pub returns: Vec<Option<f64>>,
    /// `None` when no forward bar exists
    pub target_hit: Option<bool>,
    pub stop_hit: Option<bool>,
}

/// Aggregate for one pattern at one horizon
#[derive(Debug, Clone, PartialEq)]
pub struct PatternStats {
    pub pattern: Pattern,
    pub side: Side,
    pub horizon: usize,
    /// Trades with a defined return at this horizon
    pub n: usize,
    pub avg: Option<f64>,
    pub median: Option<f64>,
    pub pos_rate: Option<f64>,
    pub target_hit_rate: Option<f64>,
    pub stop_hit_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestReport {
    pub horizons: Vec<usize>,
    pub hit_window: usize,
    /// Sorted by date, ticker, pattern
    pub trades: Vec<TradeOutcome>,
    /// Sorted by pattern, horizon
    pub stats: Vec<PatternStats>,
}

impl ScanEngine {
    /// Score every gated candidate in the table against its own future bars
    pub fn backtest(&self, table: &PriceTable) -> Result<BacktestReport> {
        let cfg = &self.config().backtest;
        let horizons: Vec<usize> = cfg.horizons.iter().map(|h| h.get()).collect();
        let hit_window = cfg.hit_window.get();

        let mut trades: Vec<TradeOutcome> = table
            .series()
            .par_iter()
            .flat_map_iter(|series| {
                let gated = self.scan_series(series).gated;
                let closes = series.closes();
                let horizons = &horizons;
                gated.into_iter().map(move |setup| {
                    trade_outcome(series, &closes, setup, horizons, hit_window)
                })
            })
            .collect();
        trades.sort_by(|a, b| {
            (a.setup.date(), a.setup.ticker(), a.setup.pattern()).cmp(&(
                b.setup.date(),
                b.setup.ticker(),
                b.setup.pattern(),
            ))
        });

        let stats = summarize(&trades, &horizons);

        tracing::info!(
            tickers = table.ticker_count(),
            trades = trades.len(),
            groups = stats.len(),
            "backtest complete"
        );

        Ok(BacktestReport {
            horizons,
            hit_window,
            trades,
            stats,
        })
    }
}

fn trade_outcome(
    series: &TickerSeries,
    closes: &[f64],
    setup: GatedCandidate,
    horizons: &[usize],
    hit_window: usize,
) -> TradeOutcome {
    let index = setup.candidate.index;
    let side = setup.side();
    let returns = horizons
        .iter()
        .map(|&h| forward_return(closes, index, h, side))
        .collect();

    let start = index + 1;
    let end = index
        .saturating_add(hit_window)
        .min(series.len().saturating_sub(1));
    let (target_hit, stop_hit) = if start <= end {
        let window = &series.bars[start..=end];
        let max_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let min_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let levels = &setup.levels;
        match side {
            Side::Long => (Some(max_high >= levels.target), Some(min_low <= levels.stop)),
            Side::Short => (Some(min_low <= levels.target), Some(max_high >= levels.stop)),
        }
    } else {
        (None, None)
    };

    TradeOutcome {
        setup,
        returns,
        target_hit,
        stop_hit,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Middle value; mean of the two middle values for even counts
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn hit_rate(flags: impl Iterator<Item = Option<bool>>) -> Option<f64> {
    let known: Vec<f64> = flags
        .flatten()
        .map(|hit| if hit { 1.0 } else { 0.0 })
        .collect();
    mean(&known)
}

fn summarize(trades: &[TradeOutcome], horizons: &[usize]) -> Vec<PatternStats> {
    let mut by_pattern: BTreeMap<Pattern, Vec<&TradeOutcome>> = BTreeMap::new();
    for trade in trades {
        by_pattern.entry(trade.setup.pattern()).or_default().push(trade);
    }

    let mut stats = Vec::new();
    for (pattern, group) in by_pattern {
        let target_hit_rate = hit_rate(group.iter().map(|t| t.target_hit));
        let stop_hit_rate = hit_rate(group.iter().map(|t| t.stop_hit));
        for (slot, &horizon) in horizons.iter().enumerate() {
            let values: Vec<f64> = group
                .iter()
                .filter_map(|t| t.returns.get(slot).copied().flatten())
                .collect();
            let wins: Vec<f64> = values
                .iter()
                .map(|&r| if r > 0.0 { 1.0 } else { 0.0 })
                .collect();
            stats.push(PatternStats {
                pattern,
                side: pattern.side(),
                horizon,
                n: values.len(),
                avg: mean(&values),
                median: median(&values),
                pos_rate: mean(&wins),
                target_hit_rate,
                stop_hit_rate,
            });
        }
    }
    stats
}

// ============================================================
// CSV OUTPUT
// ============================================================

impl BacktestReport {
    pub fn trades_header(&self) -> Vec<String> {
        let mut header: Vec<String> = [
            "Date", "Ticker", "Group", "Pattern", "Side", "Close", "Stop", "Target", "R_R",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend(self.horizons.iter().map(|h| format!("Ret{h}")));
        header.extend(self.horizons.iter().map(|h| format!("Win{h}")));
        header.push("TargetHit".into());
        header.push("StopHit".into());
        header
    }

    /// One row per trade; the header is always written
    pub fn write_trades_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.trades_header())?;
        for trade in &self.trades {
            let s = &trade.setup;
            let mut record = vec![
                s.date().to_string(),
                s.ticker().to_string(),
                s.group.to_string(),
                s.pattern().to_string(),
                s.side().to_string(),
                fmt_num(s.close, 4),
                fmt_num(s.levels.stop, 4),
                fmt_num(s.levels.target, 4),
                fmt_num(s.levels.rr, 2),
            ];
            record.extend(trade.returns.iter().map(|r| fmt_opt(*r, 6)));
            record.extend(trade.returns.iter().map(|r| fmt_bool(r.map(|v| v > 0.0))));
            record.push(fmt_bool(trade.target_hit));
            record.push(fmt_bool(trade.stop_hit));
            wtr.write_record(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// One row per pattern and horizon; the header is always written
    pub fn write_stats_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record([
            "Pattern",
            "Side",
            "Horizon",
            "N",
            "Avg",
            "Median",
            "PosRate",
            "TargetHitRate",
            "StopHitRate",
        ])?;
        for st in &self.stats {
            wtr.write_record([
                st.pattern.to_string(),
                st.side.to_string(),
                st.horizon.to_string(),
                st.n.to_string(),
                fmt_opt(st.avg, 6),
                fmt_opt(st.median, 6),
                fmt_opt(st.pos_rate, 4),
                fmt_opt(st.target_hit_rate, 4),
                fmt_opt(st.stop_hit_rate, 4),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{
            BacktestConfig, BreakoutConfig, ContinuationConfig, PatternConfig, ReversalConfig,
            RsiCrossConfig, ScanConfig,
        },
        pipeline::EngineBuilder,
        Group, Period, PriceBar,
    };
    use chrono::NaiveDate;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_hit_rate_ignores_unknown() {
        let flags = [Some(true), None, Some(false), Some(true)];
        let rate = hit_rate(flags.into_iter()).unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(hit_rate([None, None].into_iter()), None);
    }

    fn breakout_only() -> PatternConfig {
        PatternConfig {
            reversal: ReversalConfig {
                enabled: false,
                ..Default::default()
            },
            rsi_cross: RsiCrossConfig {
                enabled: false,
                ..Default::default()
            },
            continuation: ContinuationConfig {
                enabled: false,
                ..Default::default()
            },
            breakout: BreakoutConfig::default(),
            ..PatternConfig::default()
        }
    }

    /// 25 flat bars then a rising staircase
    fn staircase() -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..40)
            .map(|i| {
                let close = if i < 25 { 100.0 } else { 100.0 + 2.0 * (i - 24) as f64 };
                PriceBar {
                    date: start + chrono::Duration::days(i),
                    ticker: "UP".into(),
                    group: Group::Breakouts,
                    open: close - 0.5,
                    high: close + 0.5,
                    low: close - 1.0,
                    close,
                    volume: None,
                }
            })
            .collect()
    }

    #[test]
    fn test_breakouts_on_staircase() {
        let table = PriceTable::new(staircase()).unwrap();
        let engine = EngineBuilder::new().patterns(breakout_only()).build().unwrap();
        let report = engine.backtest(&table).unwrap();

        // every bar from 25 on closes above the prior 20-bar high
        assert_eq!(report.trades.len(), 15);
        let first = &report.trades[0];
        assert_eq!(first.setup.pattern(), Pattern::BreakoutLong);
        assert_eq!(first.setup.candidate.index, 25);
        // close 102, 5 bars later 112
        let r5 = first.returns[0].unwrap();
        assert!((r5 - 10.0 / 102.0).abs() < 1e-12);
        assert_eq!(first.target_hit, Some(true));
        assert_eq!(first.stop_hit, Some(false));

        // last bar has no forward data at all
        let last = report.trades.last().unwrap();
        assert_eq!(last.returns, vec![None, None, None]);
        assert_eq!(last.target_hit, None);

        let st5 = &report.stats[0];
        assert_eq!(st5.pattern, Pattern::BreakoutLong);
        assert_eq!(st5.horizon, 5);
        assert_eq!(st5.n, 10);
        assert_eq!(st5.pos_rate, Some(1.0));
    }

    #[test]
    fn test_hit_window_longer_than_history() {
        let cfg = ScanConfig {
            patterns: breakout_only(),
            backtest: BacktestConfig {
                hit_window: Period::new(usize::MAX).unwrap(),
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = EngineBuilder::new().config(cfg).build().unwrap();
        let report = engine.backtest(&PriceTable::new(staircase()).unwrap()).unwrap();

        assert_eq!(report.trades.len(), 15);
        // the window runs to the last bar
        assert_eq!(report.trades[0].target_hit, Some(true));
        assert_eq!(report.trades.last().unwrap().target_hit, None);
    }

    #[test]
    fn test_csv_headers_follow_horizons() {
        let table = PriceTable::new(staircase()).unwrap();
        let engine = EngineBuilder::new().patterns(breakout_only()).build().unwrap();
        let report = engine.backtest(&table).unwrap();

        let mut trades = Vec::new();
        report.write_trades_csv(&mut trades).unwrap();
        let trades = String::from_utf8(trades).unwrap();
        assert!(trades.starts_with(
            "Date,Ticker,Group,Pattern,Side,Close,Stop,Target,R_R,Ret5,Ret10,Ret15,Win5,Win10,Win15,TargetHit,StopHit\n"
        ));
        assert_eq!(trades.lines().count(), 16);

        let mut stats = Vec::new();
        report.write_stats_csv(&mut stats).unwrap();
        let stats = String::from_utf8(stats).unwrap();
        let mut lines = stats.lines();
        assert_eq!(
            lines.next(),
            Some("Pattern,Side,Horizon,N,Avg,Median,PosRate,TargetHitRate,StopHitRate")
        );
        assert!(lines.next().unwrap().starts_with("BreakoutLong,long,5,10,"));
    }

    #[test]
    fn test_empty_table_has_headers_only() {
        let engine = EngineBuilder::new().build().unwrap();
        let report = engine.backtest(&PriceTable::default()).unwrap();
        assert!(report.trades.is_empty());
        let mut out = Vec::new();
        report.write_stats_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }
}
