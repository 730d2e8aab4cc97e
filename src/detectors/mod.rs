//! Setup pattern detectors
//!
//! Each family looks at one row of an [`IndicatorFrame`] (plus the previous
//! row where it needs one) and fires at most one [`Pattern`]. Families are
//! independent and may co-fire on the same row; collapsing to one label is
//! the job of [`LabelPolicy`](crate::config::LabelPolicy).
//!
//! # Families
//!
//! - **Reversal**: RSI extreme + engulfing candle, optionally gated by group tag
//! - **Engulf**: bare engulfing candle
//! - **RSI cross**: RSI leaving the oversold/overbought zone
//! - **Breakout**: close beyond the prior-N-bar high/low
//! - **Continuation**: trend-side of the fast MA, mid-band RSI, shallow pullback
//! - **Momentum**: RSI rising/falling day over day

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{config::PatternConfig, indicators::IndicatorFrame, EngineError, Side};

pub mod helpers;

pub mod breakout;
pub mod continuation;
pub mod momentum;
pub mod two_bar;

pub use breakout::*;
pub use continuation::*;
pub use helpers::*;
pub use momentum::*;
pub use two_bar::*;

// ============================================================
// PATTERNS
// ============================================================

/// A fired setup pattern. The side is implied by the variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Pattern {
    ReversalLong,
    ReversalShort,
    EngulfLong,
    EngulfShort,
    RsiCrossLong,
    RsiCrossShort,
    BreakoutLong,
    BreakdownShort,
    ContinuationLong,
    ContinuationShort,
    RsiRisingLong,
    RsiFallingShort,
}

/// Detector family a pattern belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternFamily {
    Reversal,
    Engulf,
    RsiCross,
    Breakout,
    Continuation,
    Momentum,
}

impl Pattern {
    pub const ALL: [Pattern; 12] = [
        Pattern::ReversalLong,
        Pattern::ReversalShort,
        Pattern::EngulfLong,
        Pattern::EngulfShort,
        Pattern::RsiCrossLong,
        Pattern::RsiCrossShort,
        Pattern::BreakoutLong,
        Pattern::BreakdownShort,
        Pattern::ContinuationLong,
        Pattern::ContinuationShort,
        Pattern::RsiRisingLong,
        Pattern::RsiFallingShort,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Pattern::ReversalLong => "ReversalLong",
            Pattern::ReversalShort => "ReversalShort",
            Pattern::EngulfLong => "EngulfLong",
            Pattern::EngulfShort => "EngulfShort",
            Pattern::RsiCrossLong => "RsiCrossLong",
            Pattern::RsiCrossShort => "RsiCrossShort",
            Pattern::BreakoutLong => "BreakoutLong",
            Pattern::BreakdownShort => "BreakdownShort",
            Pattern::ContinuationLong => "ContinuationLong",
            Pattern::ContinuationShort => "ContinuationShort",
            Pattern::RsiRisingLong => "RsiRisingLong",
            Pattern::RsiFallingShort => "RsiFallingShort",
        }
    }

    pub fn side(self) -> Side {
        match self {
            Pattern::ReversalLong
            | Pattern::EngulfLong
            | Pattern::RsiCrossLong
            | Pattern::BreakoutLong
            | Pattern::ContinuationLong
            | Pattern::RsiRisingLong => Side::Long,
            Pattern::ReversalShort
            | Pattern::EngulfShort
            | Pattern::RsiCrossShort
            | Pattern::BreakdownShort
            | Pattern::ContinuationShort
            | Pattern::RsiFallingShort => Side::Short,
        }
    }

    pub fn family(self) -> PatternFamily {
        match self {
            Pattern::ReversalLong | Pattern::ReversalShort => PatternFamily::Reversal,
            Pattern::EngulfLong | Pattern::EngulfShort => PatternFamily::Engulf,
            Pattern::RsiCrossLong | Pattern::RsiCrossShort => PatternFamily::RsiCross,
            Pattern::BreakoutLong | Pattern::BreakdownShort => PatternFamily::Breakout,
            Pattern::ContinuationLong | Pattern::ContinuationShort => PatternFamily::Continuation,
            Pattern::RsiRisingLong | Pattern::RsiFallingShort => PatternFamily::Momentum,
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = EngineError;

    fn from_str(s: &str) -> crate::Result<Self> {
        Pattern::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| EngineError::MalformedInput(format!("unknown pattern {s:?}")))
    }
}

/// One pattern firing on one ticker-date
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCandidate {
    pub ticker: String,
    pub date: chrono::NaiveDate,
    /// Bar index within the ticker's series
    pub index: usize,
    pub pattern: Pattern,
}

impl PatternCandidate {
    #[inline]
    pub fn side(&self) -> Side {
        self.pattern.side()
    }
}

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// Row-level pattern detector
pub trait PatternDetector: Send + Sync {
    fn family(&self) -> PatternFamily;

    /// Bars of history needed before the detector can fire at all
    fn min_bars(&self) -> usize;

    fn detect(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Pattern>;
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch, no vtable
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect(&self, frame: &IndicatorFrame<'_>, index: usize) -> Option<Pattern> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, frame, index)),*
                }
            }

            #[inline]
            pub fn family(&self) -> PatternFamily {
                match self {
                    $(Self::$variant(d) => PatternDetector::family(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    Reversal(ReversalDetector),
    Engulfing(EngulfingDetector),
    RsiCross(RsiCrossDetector),
    Breakout(BreakoutDetector),
    Continuation(ContinuationDetector),
    Momentum(RsiMomentumDetector),
}

impl BuiltinDetector {
    /// Detectors for every enabled family, in evaluation order
    pub fn from_config(cfg: &PatternConfig) -> Vec<BuiltinDetector> {
        let mut detectors = Vec::new();
        if cfg.reversal.enabled {
            detectors.push(BuiltinDetector::Reversal(ReversalDetector::from(&cfg.reversal)));
        }
        if cfg.engulf.enabled {
            detectors.push(BuiltinDetector::Engulfing(EngulfingDetector));
        }
        if cfg.rsi_cross.enabled {
            detectors.push(BuiltinDetector::RsiCross(RsiCrossDetector::from(&cfg.rsi_cross)));
        }
        if cfg.breakout.enabled {
            detectors.push(BuiltinDetector::Breakout(BreakoutDetector::from(&cfg.breakout)));
        }
        if cfg.continuation.enabled {
            detectors.push(BuiltinDetector::Continuation(ContinuationDetector::from(
                &cfg.continuation,
            )));
        }
        if cfg.momentum.enabled {
            detectors.push(BuiltinDetector::Momentum(RsiMomentumDetector));
        }
        detectors
    }
}

/// Run every detector on one row and collect what fired
pub fn detect_row(
    detectors: &[BuiltinDetector],
    frame: &IndicatorFrame<'_>,
    index: usize,
) -> Vec<Pattern> {
    detectors
        .iter()
        .filter(|d| index + 1 >= d.min_bars())
        .filter_map(|d| d.detect(frame, index))
        .collect()
}
