//! RSI-driven families: zone exits and day-over-day direction

use super::{crossed_down, crossed_up, Pattern, PatternDetector, PatternFamily};
use crate::{config::RsiCrossConfig, indicators::IndicatorFrame};

/// RSI leaving the oversold zone (long) or the overbought zone (short)
#[derive(Debug, Clone)]
pub struct RsiCrossDetector {
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiCrossDetector {
    fn default() -> Self {
        Self::from(&RsiCrossConfig::default())
    }
}

impl From<&RsiCrossConfig> for RsiCrossDetector {
    fn from(cfg: &RsiCrossConfig) -> Self {
        Self {
            oversold: cfg.oversold,
            overbought: cfg.overbought,
        }
    }
}

impl PatternDetector for RsiCrossDetector {
    fn family(&self) -> PatternFamily {
        PatternFamily::RsiCross
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Pattern> {
        let curr = frame.row(index)?.rsi?;
        let prev = frame.row(index.checked_sub(1)?)?.rsi?;

        if crossed_up(prev, curr, self.oversold) {
            Some(Pattern::RsiCrossLong)
        } else if crossed_down(prev, curr, self.overbought) {
            Some(Pattern::RsiCrossShort)
        } else {
            None
        }
    }
}

/// RSI higher than yesterday (long) or lower (short)
#[derive(Debug, Clone, Copy, Default)]
pub struct RsiMomentumDetector;

impl PatternDetector for RsiMomentumDetector {
    fn family(&self) -> PatternFamily {
        PatternFamily::Momentum
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Pattern> {
        let curr = frame.row(index)?.rsi?;
        let prev = frame.row(index.checked_sub(1)?)?.rsi?;

        if curr > prev {
            Some(Pattern::RsiRisingLong)
        } else if curr < prev {
            Some(Pattern::RsiFallingShort)
        } else {
            None
        }
    }
}
