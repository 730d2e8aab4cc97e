//! Risk/reward gate
//!
//! Places a stop and a target for a candidate and rejects it when the risk
//! is not strictly positive or the reward multiple is below the minimum.
//! A rejected candidate produces nothing; there is no clamping.

use crate::{
    config::{GateConfig, StopModel},
    indicators::IndicatorRow,
    Side,
};

/// Stop/target placement for an accepted candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLevels {
    pub stop: f64,
    pub target: f64,
    /// Distance from entry to stop, always > 0
    pub risk: f64,
    /// Target distance over stop distance
    pub rr: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskGate {
    pub model: StopModel,
    pub min_rr: f64,
}

impl Default for RiskGate {
    fn default() -> Self {
        Self::new(&GateConfig::default())
    }
}

impl RiskGate {
    pub fn new(cfg: &GateConfig) -> Self {
        Self {
            model: cfg.stop_model,
            min_rr: cfg.min_rr,
        }
    }

    /// Entry is the bar's close. Returns `None` when the candidate is gated out.
    pub fn evaluate(&self, side: Side, close: f64, row: &IndicatorRow) -> Option<RiskLevels> {
        let sign = side.sign();
        let levels = match self.model {
            StopModel::Structural { multiple } => {
                let stop = match side {
                    Side::Long => row.stop_low?,
                    Side::Short => row.stop_high?,
                };
                let risk = sign * (close - stop);
                RiskLevels {
                    stop,
                    target: close + sign * multiple * risk,
                    risk,
                    rr: multiple,
                }
            }
            StopModel::Percent {
                stop_pct,
                target_pct,
            } => RiskLevels {
                stop: close * (1.0 - sign * stop_pct.get()),
                target: close * (1.0 + sign * target_pct.get()),
                risk: close * stop_pct.get(),
                rr: target_pct.get() / stop_pct.get(),
            },
        };

        // NaN-safe: a NaN risk or rr fails both comparisons
        if !(levels.risk > 0.0) || !(levels.rr >= self.min_rr) {
            return None;
        }
        Some(levels)
    }
}
