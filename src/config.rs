//! Run configuration
//!
//! Every tunable of a scan lives in [`ScanConfig`]: indicator windows,
//! per-family pattern thresholds, the stop model, the grading strategy and
//! the collapse policy for co-firing patterns. Nothing is process-global;
//! two engines with different configs can run side by side.
//!
//! All sections deserialize with defaults, so a JSON document only needs the
//! fields it overrides:
//!
//! ```rust
//! use setupscan::config::{GradingStrategy, ScanConfig};
//!
//! let cfg = ScanConfig::from_json_str(r#"{
//!     "gate": { "min_rr": 1.5, "stop_model": { "kind": "percent", "stop_pct": 0.04, "target_pct": 0.08 } },
//!     "grading": { "kind": "empirical", "half_life_days": 30.0 }
//! }"#).unwrap();
//!
//! assert_eq!(cfg.gate.min_rr, 1.5);
//! assert!(matches!(cfg.grading, GradingStrategy::Empirical(_)));
//! ```

use serde::{Deserialize, Serialize};

use crate::{detectors::Pattern, EngineError, Period, Ratio, Result};

// ============================================================
// INDICATORS
// ============================================================

/// Indicator windows, in bars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: Period,
    pub atr_period: Period,
    pub ma_fast: Period,
    pub ma_slow: Period,
    /// Prior-N-bar extremes used as structural stops (H3/L3)
    pub stop_window: Period,
    /// Prior-N-bar swing range used for retracement and fresh highs/lows
    pub swing_window: Period,
    /// Prior-N-bar extremes a breakout/breakdown must clear
    pub breakout_window: Period,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: Period::new_const(14),
            atr_period: Period::new_const(20),
            ma_fast: Period::new_const(50),
            ma_slow: Period::new_const(200),
            stop_window: Period::new_const(3),
            swing_window: Period::new_const(10),
            breakout_window: Period::new_const(20),
        }
    }
}

// ============================================================
// PATTERN FAMILIES
// ============================================================

/// Inclusive RSI band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiBand {
    pub low: f64,
    pub high: f64,
}

impl RsiBand {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// RSI extreme + engulfing reversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversalConfig {
    pub enabled: bool,
    pub oversold: f64,
    pub overbought: f64,
    /// Only oversold-tagged rows may reverse long, overbought-tagged short
    pub require_group: bool,
}

impl Default for ReversalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            oversold: 30.0,
            overbought: 70.0,
            require_group: true,
        }
    }
}

/// On/off switch for families without thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleConfig {
    pub enabled: bool,
}

/// RSI leaving an extreme zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiCrossConfig {
    pub enabled: bool,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiCrossConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

/// Close beyond the prior-N-bar high/low
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutConfig {
    pub enabled: bool,
    /// Only breakouts-tagged rows may fire
    pub require_group: bool,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_group: false,
        }
    }
}

/// Trend continuation off the fast moving average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuationConfig {
    pub enabled: bool,
    pub long_band: RsiBand,
    pub short_band: RsiBand,
    /// Deepest pullback, as a fraction of the swing range, still counted as shallow
    pub max_retrace: Ratio,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            long_band: RsiBand::new(40.0, 65.0),
            short_band: RsiBand::new(35.0, 60.0),
            max_retrace: Ratio::new_const(0.38),
        }
    }
}

/// Per-family switches and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub reversal: ReversalConfig,
    /// Bare engulfing candles, without the RSI condition
    pub engulf: ToggleConfig,
    pub rsi_cross: RsiCrossConfig,
    pub breakout: BreakoutConfig,
    pub continuation: ContinuationConfig,
    /// RSI rising/falling day over day
    pub momentum: ToggleConfig,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            reversal: ReversalConfig::default(),
            engulf: ToggleConfig { enabled: false },
            rsi_cross: RsiCrossConfig::default(),
            breakout: BreakoutConfig::default(),
            continuation: ContinuationConfig::default(),
            momentum: ToggleConfig { enabled: false },
        }
    }
}

/// How co-firing patterns on one row become candidates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "order", rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Every firing pattern becomes its own candidate
    #[default]
    All,
    /// Keep only the first firing pattern in this order; unlisted patterns are dropped
    Priority(Vec<Pattern>),
}

impl LabelPolicy {
    /// Single-label order of the legacy quality backtest
    pub fn legacy() -> Self {
        LabelPolicy::Priority(vec![
            Pattern::ReversalLong,
            Pattern::ReversalShort,
            Pattern::ContinuationLong,
            Pattern::ContinuationShort,
        ])
    }

    /// Collapse the patterns fired on one row
    pub fn apply(&self, fired: Vec<Pattern>) -> Vec<Pattern> {
        match self {
            LabelPolicy::All => fired,
            LabelPolicy::Priority(order) => order
                .iter()
                .find(|p| fired.contains(p))
                .map(|p| vec![*p])
                .unwrap_or_default(),
        }
    }
}

// ============================================================
// GATE
// ============================================================

/// How stop and target are placed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopModel {
    /// Stop at the prior-window low (long) / high (short); target at `multiple` x risk
    Structural { multiple: f64 },
    /// Stop and target at fixed fractions of the close
    Percent { stop_pct: Ratio, target_pct: Ratio },
}

impl Default for StopModel {
    fn default() -> Self {
        StopModel::Structural { multiple: 1.25 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub stop_model: StopModel,
    pub min_rr: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            stop_model: StopModel::default(),
            min_rr: 1.25,
        }
    }
}

// ============================================================
// GRADING
// ============================================================

/// Lower bounds for A+, A and B+; anything below `b_plus` is rejected
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeTiers {
    pub a_plus: f64,
    pub a: f64,
    pub b_plus: f64,
}

impl GradeTiers {
    /// Risk/reward breakpoints
    pub const fn rr_default() -> Self {
        Self {
            a_plus: 1.75,
            a: 1.50,
            b_plus: 1.25,
        }
    }

    /// Win-rate breakpoints
    pub const fn win_rate_default() -> Self {
        Self {
            a_plus: 0.65,
            a: 0.55,
            b_plus: 0.50,
        }
    }
}

/// Recency-weighted historical win rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmpiricalConfig {
    /// Calendar days of history behind each evaluation date
    pub lookback_days: u32,
    /// Forward bars used to score a historical sample
    pub horizon: Period,
    pub half_life_days: f64,
    /// Weighted sample count below which the global rate is used
    pub min_samples: f64,
    pub tiers: GradeTiers,
}

impl Default for EmpiricalConfig {
    fn default() -> Self {
        Self {
            lookback_days: 180,
            horizon: Period::new_const(10),
            half_life_days: 60.0,
            min_samples: 80.0,
            tiers: GradeTiers::win_rate_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradingStrategy {
    Static {
        #[serde(default = "GradeTiers::rr_default")]
        tiers: GradeTiers,
    },
    Empirical(EmpiricalConfig),
}

impl Default for GradingStrategy {
    fn default() -> Self {
        GradingStrategy::Static {
            tiers: GradeTiers::rr_default(),
        }
    }
}

/// Which candidate dates get graded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationScope {
    /// Only the latest date present in the table
    #[default]
    Latest,
    /// Every date, each against its own past
    All,
}

// ============================================================
// BACKTEST / SCREEN
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Forward horizons, in bars, for directional returns
    pub horizons: Vec<Period>,
    /// Forward bars searched for target/stop touches
    pub hit_window: Period,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            horizons: vec![
                Period::new_const(5),
                Period::new_const(10),
                Period::new_const(15),
            ],
            hit_window: Period::new_const(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

// ============================================================
// SCAN CONFIG
// ============================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub indicators: IndicatorConfig,
    pub patterns: PatternConfig,
    pub gate: GateConfig,
    pub grading: GradingStrategy,
    pub scope: EvaluationScope,
    pub label_policy: LabelPolicy,
    pub backtest: BacktestConfig,
    pub screen: ScreenConfig,
}

impl ScanConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks the field types cannot express
    pub fn validate(&self) -> Result<()> {
        let p = &self.patterns;
        check_levels("reversal", p.reversal.oversold, p.reversal.overbought)?;
        check_levels("rsi_cross", p.rsi_cross.oversold, p.rsi_cross.overbought)?;
        check_levels("screen", self.screen.oversold, self.screen.overbought)?;
        check_band("continuation.long_band", p.continuation.long_band)?;
        check_band("continuation.short_band", p.continuation.short_band)?;

        match self.gate.stop_model {
            StopModel::Structural { multiple } => {
                check_positive("gate.stop_model.multiple", multiple)?;
            }
            StopModel::Percent {
                stop_pct,
                target_pct,
            } => {
                check_positive("gate.stop_model.stop_pct", stop_pct.get())?;
                check_positive("gate.stop_model.target_pct", target_pct.get())?;
            }
        }
        check_positive("gate.min_rr", self.gate.min_rr)?;

        match &self.grading {
            GradingStrategy::Static { tiers } => check_tiers("grading.tiers", tiers)?,
            GradingStrategy::Empirical(e) => {
                if e.lookback_days == 0 {
                    return Err(EngineError::InvalidConfig(
                        "grading.lookback_days must be > 0".into(),
                    ));
                }
                check_positive("grading.half_life_days", e.half_life_days)?;
                check_range("grading.min_samples", e.min_samples, 0.0, f64::MAX)?;
                check_tiers("grading.tiers", &e.tiers)?;
            }
        }

        if let LabelPolicy::Priority(order) = &self.label_policy {
            if order.is_empty() {
                return Err(EngineError::InvalidConfig(
                    "label_policy priority order is empty".into(),
                ));
            }
        }

        if self.backtest.horizons.is_empty() {
            return Err(EngineError::InvalidConfig(
                "backtest.horizons is empty".into(),
            ));
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(EngineError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    check_range(field, value, f64::MIN_POSITIVE, f64::MAX)
}

fn check_levels(section: &str, oversold: f64, overbought: f64) -> Result<()> {
    check_range("oversold", oversold, 0.0, 100.0)?;
    check_range("overbought", overbought, 0.0, 100.0)?;
    if oversold >= overbought {
        return Err(EngineError::InvalidConfig(format!(
            "{section}: oversold ({oversold}) must be below overbought ({overbought})"
        )));
    }
    Ok(())
}

fn check_band(field: &str, band: RsiBand) -> Result<()> {
    check_range("band.low", band.low, 0.0, 100.0)?;
    check_range("band.high", band.high, 0.0, 100.0)?;
    if band.low > band.high {
        return Err(EngineError::InvalidConfig(format!(
            "{field}: low ({}) above high ({})",
            band.low, band.high
        )));
    }
    Ok(())
}

fn check_tiers(field: &str, tiers: &GradeTiers) -> Result<()> {
    let all_finite = [tiers.a_plus, tiers.a, tiers.b_plus]
        .iter()
        .all(|v| v.is_finite());
    if !all_finite || tiers.a_plus < tiers.a || tiers.a < tiers.b_plus {
        return Err(EngineError::InvalidConfig(format!(
            "{field}: expected a_plus >= a >= b_plus, got {tiers:?}"
        )));
    }
    Ok(())
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ScanConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.indicators.rsi_period.get(), 14);
        assert_eq!(cfg.gate.min_rr, 1.25);
        assert_eq!(cfg.scope, EvaluationScope::Latest);
        assert_eq!(cfg.label_policy, LabelPolicy::All);
    }

    #[test]
    fn test_empty_json_yields_defaults() {
        let cfg = ScanConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, ScanConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let cfg = ScanConfig::from_json_str(
            r#"{ "indicators": { "rsi_period": 10 }, "patterns": { "breakout": { "enabled": false } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.indicators.rsi_period.get(), 10);
        assert_eq!(cfg.indicators.atr_period.get(), 20);
        assert!(!cfg.patterns.breakout.enabled);
        assert!(cfg.patterns.reversal.enabled);
    }

    #[test]
    fn test_zero_period_rejected_at_parse() {
        let err = ScanConfig::from_json_str(r#"{ "indicators": { "rsi_period": 0 } }"#);
        assert!(matches!(err, Err(EngineError::ConfigParse(_))));
    }

    #[test]
    fn test_ratio_out_of_range_rejected_at_parse() {
        let err = ScanConfig::from_json_str(
            r#"{ "patterns": { "continuation": { "max_retrace": 1.5 } } }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_inverted_levels_rejected() {
        let mut cfg = ScanConfig::default();
        cfg.patterns.reversal.oversold = 75.0;
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_non_monotonic_tiers_rejected() {
        let cfg = ScanConfig {
            grading: GradingStrategy::Static {
                tiers: GradeTiers {
                    a_plus: 1.2,
                    a: 1.5,
                    b_plus: 1.25,
                },
            },
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_percent_stop_rejected() {
        let mut cfg = ScanConfig::default();
        cfg.gate.stop_model = StopModel::Percent {
            stop_pct: Ratio::new_const(0.0),
            target_pct: Ratio::new_const(0.05),
        };
        assert!(matches!(cfg.validate(), Err(EngineError::OutOfRange { .. })));
    }

    #[test]
    fn test_empirical_strategy_from_json() {
        let cfg = ScanConfig::from_json_str(
            r#"{ "grading": { "kind": "empirical", "lookback_days": 90, "horizon": 5 } }"#,
        )
        .unwrap();
        match cfg.grading {
            GradingStrategy::Empirical(e) => {
                assert_eq!(e.lookback_days, 90);
                assert_eq!(e.horizon.get(), 5);
                assert_eq!(e.half_life_days, 60.0);
                assert_eq!(e.min_samples, 80.0);
                assert_eq!(e.tiers, GradeTiers::win_rate_default());
            }
            other => panic!("expected empirical, got {other:?}"),
        }
    }

    #[test]
    fn test_static_strategy_default_tiers() {
        let cfg = ScanConfig::from_json_str(r#"{ "grading": { "kind": "static" } }"#).unwrap();
        assert_eq!(
            cfg.grading,
            GradingStrategy::Static {
                tiers: GradeTiers::rr_default()
            }
        );
    }

    #[test]
    fn test_priority_policy_from_json() {
        let cfg = ScanConfig::from_json_str(
            r#"{ "label_policy": { "kind": "priority", "order": ["BreakoutLong", "ReversalLong"] } }"#,
        )
        .unwrap();
        assert_eq!(
            cfg.label_policy,
            LabelPolicy::Priority(vec![Pattern::BreakoutLong, Pattern::ReversalLong])
        );
    }

    #[test]
    fn test_empty_priority_rejected() {
        let cfg = ScanConfig {
            label_policy: LabelPolicy::Priority(vec![]),
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_label_policy_all_keeps_every_pattern() {
        let fired = vec![Pattern::ReversalLong, Pattern::BreakoutLong];
        assert_eq!(LabelPolicy::All.apply(fired.clone()), fired);
    }

    #[test]
    fn test_label_policy_priority_picks_first_listed() {
        let policy = LabelPolicy::legacy();
        let fired = vec![Pattern::ContinuationLong, Pattern::ReversalLong];
        assert_eq!(policy.apply(fired), vec![Pattern::ReversalLong]);
    }

    #[test]
    fn test_label_policy_priority_drops_unlisted() {
        let policy = LabelPolicy::legacy();
        assert!(policy.apply(vec![Pattern::BreakoutLong]).is_empty());
        assert!(policy.apply(vec![]).is_empty());
    }

    #[test]
    fn test_rsi_band_inclusive() {
        let band = RsiBand::new(40.0, 65.0);
        assert!(band.contains(40.0));
        assert!(band.contains(65.0));
        assert!(!band.contains(39.99));
        assert!(!band.contains(65.01));
    }
}
