//! Two-bar candle families: engulfing and RSI-extreme engulfing reversal

use super::{Pattern, PatternDetector, PatternFamily};
use crate::{config::ReversalConfig, indicators::IndicatorFrame, Group};

// ============================================================
// ENGULFING
// ============================================================

/// Bare engulfing candle, no momentum condition
#[derive(Debug, Clone, Copy, Default)]
pub struct EngulfingDetector;

impl PatternDetector for EngulfingDetector {
    fn family(&self) -> PatternFamily {
        PatternFamily::Engulf
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Pattern> {
        let row = frame.row(index)?;
        if row.bull_engulf {
            Some(Pattern::EngulfLong)
        } else if row.bear_engulf {
            Some(Pattern::EngulfShort)
        } else {
            None
        }
    }
}

// ============================================================
// REVERSAL (RSI EXTREME + ENGULF)
// ============================================================

/// Engulfing candle printed while RSI sits in an extreme zone
#[derive(Debug, Clone)]
pub struct ReversalDetector {
    pub oversold: f64,
    pub overbought: f64,
    pub require_group: bool,
}

impl Default for ReversalDetector {
    fn default() -> Self {
        Self::from(&ReversalConfig::default())
    }
}

impl From<&ReversalConfig> for ReversalDetector {
    fn from(cfg: &ReversalConfig) -> Self {
        Self {
            oversold: cfg.oversold,
            overbought: cfg.overbought,
            require_group: cfg.require_group,
        }
    }
}

impl PatternDetector for ReversalDetector {
    fn family(&self) -> PatternFamily {
        PatternFamily::Reversal
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Pattern> {
        let bar = frame.bar(index)?;
        let row = frame.row(index)?;
        let rsi = row.rsi?;

        let group_allows = |wanted: Group| !self.require_group || bar.group == wanted;

        if row.bull_engulf && rsi <= self.oversold && group_allows(Group::Oversold) {
            return Some(Pattern::ReversalLong);
        }
        if row.bear_engulf && rsi >= self.overbought && group_allows(Group::Overbought) {
            return Some(Pattern::ReversalShort);
        }
        None
    }
}
