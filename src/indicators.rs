//! Indicator library
//!
//! Pure, per-series functions. Every output vector is index-aligned with its
//! input and carries `None` where the window is not yet full. Values at index
//! `i` depend only on inputs at indices `<= i`; the rolling extremes exclude
//! index `i` itself.
//!
//! These functions know nothing about tickers: callers pass one ticker's
//! series at a time (see [`IndicatorFrame::compute`]).

use crate::{
    config::IndicatorConfig,
    detectors::{is_bearish_engulfing, is_bullish_engulfing},
    OHLCVExt, PriceBar, OHLCV,
};

/// Floor for the average loss so a loss-free window gives RSI ~100, not NaN
pub const RSI_LOSS_FLOOR: f64 = 1e-12;

/// Which side of a rolling window to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Max,
    Min,
}

/// Wilder RSI.
///
/// Gains and losses are smoothed exponentially with `alpha = 1/period`,
/// seeded from the first price change. The first `period` values are `None`.
pub fn rsi(close: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = close.len();
    let mut out = vec![None; len];
    if period == 0 || len < 2 {
        return out;
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..len {
        let delta = close[i] - close[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = (1.0 - alpha) * avg_gain + alpha * gain;
            avg_loss = (1.0 - alpha) * avg_loss + alpha * loss;
        }

        if i >= period {
            let rs = avg_gain / avg_loss.max(RSI_LOSS_FLOOR);
            out[i] = Some(100.0 - 100.0 / (1.0 + rs));
        }
    }
    out
}

/// True range: `max(high - low, |high - prev_close|, |low - prev_close|)`.
/// The first bar has no previous close and uses `high - low`.
pub fn true_range<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| bar.true_range(i.checked_sub(1).map(|p| bars[p].close())))
        .collect()
}

/// Average true range as a simple rolling mean of [`true_range`]
pub fn atr<T: OHLCV>(bars: &[T], period: usize) -> Vec<Option<f64>> {
    sma(&true_range(bars), period)
}

/// Simple moving average over `period` values, including the current one
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            Some(window.iter().sum::<f64>() / period as f64)
        })
        .collect()
}

/// Extreme of the `window` values strictly before each index.
///
/// Equivalent to shifting the series by one bar and taking a rolling
/// max/min with `min_periods = window`.
pub fn rolling_extreme(values: &[f64], window: usize, kind: Extreme) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i < window {
                return None;
            }
            let prior = values[i - window..i].iter().copied();
            Some(match kind {
                Extreme::Max => prior.fold(f64::NEG_INFINITY, f64::max),
                Extreme::Min => prior.fold(f64::INFINITY, f64::min),
            })
        })
        .collect()
}

/// Depth of the pullback from `from` toward `to`, as a fraction of the
/// swing range, clipped to [0, 1]. A zero-width range counts as no pullback.
///
/// Longs measure from the swing high (`from = high`, `to = low`); shorts
/// from the swing low.
pub fn retrace_pct(close: f64, from: f64, to: f64) -> f64 {
    let span = from - to;
    if span.abs() <= f64::EPSILON {
        return 0.0;
    }
    ((from - close) / span).clamp(0.0, 1.0)
}

// ============================================================
// INDICATOR FRAME
// ============================================================

/// Derived values for one bar
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorRow {
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub ma_fast: Option<f64>,
    pub ma_slow: Option<f64>,
    /// Prior-window high/low used as structural stops (H3/L3)
    pub stop_high: Option<f64>,
    pub stop_low: Option<f64>,
    pub swing_high: Option<f64>,
    pub swing_low: Option<f64>,
    pub breakout_high: Option<f64>,
    pub breakout_low: Option<f64>,
    /// Pullback from the swing high
    pub retrace_long: Option<f64>,
    /// Pullback from the swing low
    pub retrace_short: Option<f64>,
    pub bull_engulf: bool,
    pub bear_engulf: bool,
}

/// One ticker's bars with their derived rows
#[derive(Debug, Clone)]
pub struct IndicatorFrame<'a> {
    bars: &'a [PriceBar],
    rows: Vec<IndicatorRow>,
}

impl<'a> IndicatorFrame<'a> {
    /// Annotate a single ticker's date-ordered bars
    pub fn compute(bars: &'a [PriceBar], cfg: &IndicatorConfig) -> Self {
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();

        let rsi = rsi(&close, cfg.rsi_period.get());
        let atr = atr(bars, cfg.atr_period.get());
        let ma_fast = sma(&close, cfg.ma_fast.get());
        let ma_slow = sma(&close, cfg.ma_slow.get());
        let stop_high = rolling_extreme(&high, cfg.stop_window.get(), Extreme::Max);
        let stop_low = rolling_extreme(&low, cfg.stop_window.get(), Extreme::Min);
        let swing_high = rolling_extreme(&high, cfg.swing_window.get(), Extreme::Max);
        let swing_low = rolling_extreme(&low, cfg.swing_window.get(), Extreme::Min);
        let breakout_high = rolling_extreme(&high, cfg.breakout_window.get(), Extreme::Max);
        let breakout_low = rolling_extreme(&low, cfg.breakout_window.get(), Extreme::Min);

        let rows = (0..bars.len())
            .map(|i| {
                let (bull_engulf, bear_engulf) = match i.checked_sub(1) {
                    Some(p) => (
                        is_bullish_engulfing(&bars[p], &bars[i]),
                        is_bearish_engulfing(&bars[p], &bars[i]),
                    ),
                    None => (false, false),
                };
                let swing = swing_high[i].zip(swing_low[i]);
                IndicatorRow {
                    rsi: rsi[i],
                    atr: atr[i],
                    ma_fast: ma_fast[i],
                    ma_slow: ma_slow[i],
                    stop_high: stop_high[i],
                    stop_low: stop_low[i],
                    swing_high: swing_high[i],
                    swing_low: swing_low[i],
                    breakout_high: breakout_high[i],
                    breakout_low: breakout_low[i],
                    retrace_long: swing.map(|(h, l)| retrace_pct(close[i], h, l)),
                    retrace_short: swing.map(|(h, l)| retrace_pct(close[i], l, h)),
                    bull_engulf,
                    bear_engulf,
                }
            })
            .collect();

        Self { bars, rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn bars(&self) -> &'a [PriceBar] {
        self.bars
    }

    #[inline]
    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    #[inline]
    pub fn bar(&self, index: usize) -> Option<&'a PriceBar> {
        self.bars.get(index)
    }

    #[inline]
    pub fn row(&self, index: usize) -> Option<&IndicatorRow> {
        self.rows.get(index)
    }
}

// ============================================================
// TESTS
// ============================================================
