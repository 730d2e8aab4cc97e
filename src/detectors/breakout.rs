//! N-bar breakout / breakdown

use super::{Pattern, PatternDetector, PatternFamily};
use crate::{config::BreakoutConfig, indicators::IndicatorFrame, Group};

/// Close above the prior-N-bar high, or below the prior-N-bar low.
///
/// N is the frame's breakout window; the extremes exclude today's bar.
#[derive(Debug, Clone, Default)]
pub struct BreakoutDetector {
    pub require_group: bool,
}

impl From<&BreakoutConfig> for BreakoutDetector {
    fn from(cfg: &BreakoutConfig) -> Self {
        Self {
            require_group: cfg.require_group,
        }
    }
}

impl PatternDetector for BreakoutDetector {
    fn family(&self) -> PatternFamily {
        PatternFamily::Breakout
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Pattern> {
        let bar = frame.bar(index)?;
        if self.require_group && bar.group != Group::Breakouts {
            return None;
        }
        let row = frame.row(index)?;

        if row.breakout_high.is_some_and(|high| bar.close > high) {
            Some(Pattern::BreakoutLong)
        } else if row.breakout_low.is_some_and(|low| bar.close < low) {
            Some(Pattern::BreakdownShort)
        } else {
            None
        }
    }
}
