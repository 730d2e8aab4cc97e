//! Trend continuation
//!
//! Long: close above the fast MA, RSI inside the long band, and either a
//! shallow pullback from the swing high or a fresh swing high; confirmed by
//! a bullish engulfing candle or the fresh high itself. Short mirrors it
//! against the swing low.

use super::{Pattern, PatternDetector, PatternFamily};
use crate::{
    config::{ContinuationConfig, RsiBand},
    indicators::{IndicatorFrame, IndicatorRow},
    Ratio,
};

#[derive(Debug, Clone)]
pub struct ContinuationDetector {
    pub long_band: RsiBand,
    pub short_band: RsiBand,
    pub max_retrace: Ratio,
}

impl Default for ContinuationDetector {
    fn default() -> Self {
        Self::from(&ContinuationConfig::default())
    }
}

impl From<&ContinuationConfig> for ContinuationDetector {
    fn from(cfg: &ContinuationConfig) -> Self {
        Self {
            long_band: cfg.long_band,
            short_band: cfg.short_band,
            max_retrace: cfg.max_retrace,
        }
    }
}

impl ContinuationDetector {
    fn is_long(&self, close: f64, row: &IndicatorRow) -> bool {
        let (Some(ma), Some(rsi), Some(swing_high), Some(retrace)) =
            (row.ma_fast, row.rsi, row.swing_high, row.retrace_long)
        else {
            return false;
        };
        // needs a structural stop to be tradeable
        if row.stop_low.is_none() {
            return false;
        }
        let fresh_high = close > swing_high;
        close > ma
            && self.long_band.contains(rsi)
            && (retrace <= self.max_retrace.get() || fresh_high)
            && (row.bull_engulf || fresh_high)
    }

    fn is_short(&self, close: f64, row: &IndicatorRow) -> bool {
        let (Some(ma), Some(rsi), Some(swing_low), Some(retrace)) =
            (row.ma_fast, row.rsi, row.swing_low, row.retrace_short)
        else {
            return false;
        };
        if row.stop_high.is_none() {
            return false;
        }
        let fresh_low = close < swing_low;
        close < ma
            && self.short_band.contains(rsi)
            && (retrace <= self.max_retrace.get() || fresh_low)
            && (row.bear_engulf || fresh_low)
    }
}

impl PatternDetector for ContinuationDetector {
    fn family(&self) -> PatternFamily {
        PatternFamily::Continuation
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Pattern> {
        let close = frame.bar(index)?.close;
        let row = frame.row(index)?;

        if self.is_long(close, row) {
            Some(Pattern::ContinuationLong)
        } else if self.is_short(close, row) {
            Some(Pattern::ContinuationShort)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_row() -> IndicatorRow {
        IndicatorRow {
            rsi: Some(55.0),
            ma_fast: Some(95.0),
            swing_high: Some(105.0),
            swing_low: Some(90.0),
            retrace_long: Some(0.2),
            retrace_short: Some(0.8),
            stop_low: Some(98.0),
            stop_high: Some(104.0),
            bull_engulf: true,
            ..IndicatorRow::default()
        }
    }

    #[test]
    fn test_shallow_pullback_with_engulf_fires_long() {
        let d = ContinuationDetector::default();
        assert!(d.is_long(102.0, &long_row()));
        assert!(!d.is_short(102.0, &long_row()));
    }

    #[test]
    fn test_deep_pullback_without_fresh_high_does_not_fire() {
        let d = ContinuationDetector::default();
        let row = IndicatorRow {
            retrace_long: Some(0.6),
            ..long_row()
        };
        assert!(!d.is_long(102.0, &row));
    }

    #[test]
    fn test_fresh_high_confirms_without_engulf() {
        let d = ContinuationDetector::default();
        let row = IndicatorRow {
            retrace_long: Some(0.0),
            bull_engulf: false,
            ..long_row()
        };
        assert!(d.is_long(106.0, &row));
        assert!(!d.is_long(104.0, &row));
    }

    #[test]
    fn test_rsi_outside_band_does_not_fire() {
        let d = ContinuationDetector::default();
        let row = IndicatorRow {
            rsi: Some(70.0),
            ..long_row()
        };
        assert!(!d.is_long(102.0, &row));
    }

    #[test]
    fn test_missing_inputs_do_not_fire() {
        let d = ContinuationDetector::default();
        let row = IndicatorRow {
            ma_fast: None,
            ..long_row()
        };
        assert!(!d.is_long(102.0, &row));
        let row = IndicatorRow {
            stop_low: None,
            ..long_row()
        };
        assert!(!d.is_long(102.0, &row));
    }

    #[test]
    fn test_short_mirror() {
        let d = ContinuationDetector::default();
        let row = IndicatorRow {
            rsi: Some(45.0),
            ma_fast: Some(100.0),
            swing_high: Some(100.0),
            swing_low: Some(90.0),
            retrace_long: Some(0.75),
            retrace_short: Some(0.25),
            stop_low: Some(91.0),
            stop_high: Some(97.0),
            bear_engulf: true,
            ..IndicatorRow::default()
        };
        assert!(d.is_short(92.5, &row));
        assert!(!d.is_long(92.5, &row));
    }
}
