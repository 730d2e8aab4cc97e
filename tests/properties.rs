//! Property tests: causality, bounds and gate/grade invariants.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use setupscan::indicators::rsi;
use setupscan::prelude::*;

/// Random walk from per-day moves and wick sizes
fn walk(ticker: &str, moves: &[(f64, f64)], group: Group) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut price = 100.0;
    moves
        .iter()
        .enumerate()
        .map(|(i, &(change, wick))| {
            let open = price;
            let close = (price + change).max(1.0);
            price = close;
            PriceBar {
                date: start + Duration::days(i as i64),
                ticker: ticker.to_string(),
                group,
                open,
                high: open.max(close) + wick,
                low: (open.min(close) - wick).max(0.01),
                close,
                volume: None,
            }
        })
        .collect()
}

fn moves(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-4.0f64..4.0, 0.0f64..2.0), len)
}

fn group() -> impl Strategy<Value = Group> {
    prop_oneof![
        Just(Group::Oversold),
        Just(Group::Overbought),
        Just(Group::Breakouts),
        Just(Group::Untagged),
    ]
}

fn small_windows() -> IndicatorConfig {
    IndicatorConfig {
        ma_fast: Period::new(10).unwrap(),
        ma_slow: Period::new(30).unwrap(),
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn rsi_stays_in_bounds(closes in prop::collection::vec(1.0f64..500.0, 0..200)) {
        for value in rsi(&closes, 14).into_iter().flatten() {
            prop_assert!((0.0..=100.0).contains(&value), "rsi {value}");
        }
    }

    #[test]
    fn rsi_warmup_is_null(closes in prop::collection::vec(1.0f64..500.0, 0..40)) {
        let values = rsi(&closes, 14);
        prop_assert_eq!(values.len(), closes.len());
        for (i, v) in values.iter().enumerate() {
            prop_assert_eq!(v.is_some(), i >= 14);
        }
    }

    /// Appending bars never changes the indicators of earlier bars
    #[test]
    fn indicators_do_not_look_ahead(m in moves(30..160), cut in 1usize..30) {
        let bars = walk("X", &m, Group::Untagged);
        let cfg = small_windows();
        let prefix_len = bars.len() - cut;

        let full = IndicatorFrame::compute(&bars, &cfg);
        let prefix = IndicatorFrame::compute(&bars[..prefix_len], &cfg);
        prop_assert_eq!(prefix.rows(), &full.rows()[..prefix_len]);
    }

    /// Setups dated inside a prefix are the same whether or not later bars exist
    #[test]
    fn setups_do_not_look_ahead(m in moves(40..160), cut in 1usize..30, g in group()) {
        let bars = walk("X", &m, g);
        let prefix_len = bars.len() - cut;
        let last_kept = bars[prefix_len - 1].date;

        let engine = EngineBuilder::new()
            .indicators(small_windows())
            .scope(EvaluationScope::All)
            .build()
            .unwrap();
        let full = engine.run(&PriceTable::new(bars.clone()).unwrap()).unwrap();
        let prefix = engine
            .run(&PriceTable::new(bars[..prefix_len].to_vec()).unwrap())
            .unwrap();

        let full_kept: Vec<&GradedSetup> =
            full.iter().filter(|s| s.setup.date() <= last_kept).collect();
        let prefix_all: Vec<&GradedSetup> = prefix.iter().collect();
        prop_assert_eq!(full_kept, prefix_all);
    }

    /// Every emitted setup has positive risk, a stop on the losing side and
    /// a reward multiple at or above the minimum
    #[test]
    fn emitted_setups_respect_the_gate(m in moves(30..200), g in group()) {
        let table = PriceTable::new(walk("X", &m, g)).unwrap();
        let engine = EngineBuilder::new()
            .indicators(small_windows())
            .scope(EvaluationScope::All)
            .build()
            .unwrap();
        let min_rr = engine.config().gate.min_rr;

        for s in engine.run(&table).unwrap().iter() {
            let lv = &s.setup.levels;
            prop_assert!(lv.risk > 0.0);
            prop_assert!(lv.rr >= min_rr);
            match s.setup.side() {
                Side::Long => {
                    prop_assert!(lv.stop < s.setup.close);
                    prop_assert!(lv.target > s.setup.close);
                }
                Side::Short => {
                    prop_assert!(lv.stop > s.setup.close);
                    prop_assert!(lv.target < s.setup.close);
                }
            }
        }
    }

    /// A larger reward multiple never earns a worse grade
    #[test]
    fn static_grades_are_monotonic(a in 0.5f64..3.0, b in 0.5f64..3.0) {
        let tiers = GradeTiers::rr_default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        match (tiers.grade(lo), tiers.grade(hi)) {
            (Some(g_lo), Some(g_hi)) => prop_assert!(g_hi <= g_lo),
            (Some(_), None) => prop_assert!(false, "{hi} ungraded while {lo} graded"),
            _ => {}
        }
    }
}

#[test]
fn static_grade_breakpoints() {
    let tiers = GradeTiers::rr_default();
    assert_eq!(tiers.grade(1.30), Some(Grade::BPlus));
    assert_eq!(tiers.grade(1.60), Some(Grade::A));
    assert_eq!(tiers.grade(2.00), Some(Grade::APlus));
}
