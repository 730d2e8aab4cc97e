//! # setupscan - graded trade setups from daily OHLC data
//!
//! Detects long/short setups per ticker (RSI reversals, RSI crosses,
//! breakouts, continuations), gates them by risk/reward and grades the
//! survivors either by fixed R/R tiers or by a recency-weighted empirical
//! win rate.
//!
//! ## Quick Start
//!
//! ```rust
//! use setupscan::prelude::*;
//!
//! let csv = "Date,Ticker,Group,Open,High,Low,Close,Volume\n";
//! let table = PriceTable::from_csv_reader(csv.as_bytes()).unwrap();
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let setups = engine.run(&table).unwrap();
//! assert!(setups.is_empty());
//!
//! // An empty result still carries the full header
//! let mut out = Vec::new();
//! setups.write_csv(&mut out).unwrap();
//! assert!(String::from_utf8(out).unwrap().starts_with("Date,Ticker,Group,Pattern,Side"));
//! ```

pub mod backtest;
pub mod config;
pub mod detectors;
pub mod gate;
pub mod grading;
pub mod indicators;
pub mod pipeline;
pub mod screen;
pub mod table;

pub mod prelude {
    pub use crate::{
        // Backtest
        backtest::{BacktestReport, PatternStats, TradeOutcome},
        // Configuration
        config::{
            BacktestConfig, BreakoutConfig, ContinuationConfig, EmpiricalConfig,
            EvaluationScope, GateConfig, GradeTiers, GradingStrategy, IndicatorConfig,
            LabelPolicy, PatternConfig, ReversalConfig, RsiBand, RsiCrossConfig, ScanConfig,
            ScreenConfig, StopModel, ToggleConfig,
        },
        // Detectors
        detectors::{BuiltinDetector, Pattern, PatternCandidate, PatternDetector, PatternFamily},
        // Gate
        gate::{RiskGate, RiskLevels},
        // Grading
        grading::{
            EmpiricalGrader, Grade, GradeOutcome, Grader, OutcomeSample, RateSnapshot, RateSource,
            WinRate,
        },
        // Indicators
        indicators::{Extreme, IndicatorFrame, IndicatorRow},
        // Pipeline
        pipeline::{EngineBuilder, GatedCandidate, GradedSetup, ScanEngine, SeriesScan, SetupTable},
        // Screen
        screen::{ExtremeRow, ExtremeTable},
        // Tables
        table::{normalize_ticker, PriceTable, TickerSeries},
        // Errors
        EngineError,
        Group,
        // Core traits
        OHLCVExt,
        Period,
        PriceBar,
        Ratio,
        Result,
        Side,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced to the caller.
///
/// Only structural problems are errors. Per-row numeric edge cases
/// (short history, zero ranges, rejected candidates) never raise; they
/// simply produce no output rows.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Malformed input: missing required columns {0:?}")]
    MissingColumns(Vec<&'static str>),

    #[error("Malformed input at row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("Invalid OHLC at row {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(EngineError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(EngineError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core daily bar trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    fn volume(&self) -> Option<f64> {
        None
    }
}

/// Extension trait with computed properties for OHLC data
pub trait OHLCVExt: OHLCV {
    /// `max(high - low, |high - prev_close|, |low - prev_close|)`, or the
    /// plain range when there is no previous close
    #[inline]
    fn true_range(&self, prev_close: Option<f64>) -> f64 {
        let high_low = self.high() - self.low();
        match prev_close {
            Some(pc) => high_low
                .max((self.high() - pc).abs())
                .max((self.low() - pc).abs()),
            None => high_low,
        }
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate bar consistency: finite, non-negative, high >= low
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if prices.iter().any(|p| *p < 0.0) {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "negative price",
            });
        }
        if self.high() < self.low() {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if let Some(v) = self.volume() {
            if !v.is_finite() || v < 0.0 {
                return Err(EngineError::InvalidOHLCV {
                    index: 0,
                    reason: "volume must be finite and non-negative",
                });
            }
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// DOMAIN TYPES
// ============================================================

/// Trade direction of a setup
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }

    /// +1.0 for longs, -1.0 for shorts. Multiplies raw returns into
    /// direction-adjusted returns.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watchlist membership tag assigned upstream
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Oversold,
    Overbought,
    Breakouts,
    #[default]
    Untagged,
}

impl Group {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Group::Oversold => "oversold",
            Group::Overbought => "overbought",
            Group::Breakouts => "breakouts",
            Group::Untagged => "",
        }
    }
}

impl std::str::FromStr for Group {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oversold" => Ok(Group::Oversold),
            "overbought" => Ok(Group::Overbought),
            // pullback lists are screened together with breakouts
            "breakouts" | "breakout" | "pullbacks" => Ok(Group::Breakouts),
            "" => Ok(Group::Untagged),
            other => Err(EngineError::MalformedInput(format!(
                "unknown group tag {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ticker, one trading date
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceBar {
    pub date: chrono::NaiveDate,
    pub ticker: String,
    pub group: Group,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl OHLCV for PriceBar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> Option<f64> {
        self.volume
    }
}

// ============================================================
// TESTS
// ============================================================
