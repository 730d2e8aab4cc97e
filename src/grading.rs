//! Setup grading
//!
//! Two strategies share one tier table shape ([`GradeTiers`]):
//!
//! - **Static**: the setup's risk/reward multiple is mapped to a grade.
//! - **Empirical**: the recency-weighted win rate of past candidates of the
//!   same pattern is mapped to a grade, falling back to the rate over all
//!   patterns when the pattern's weighted sample is too thin.
//!
//! Empirical rates for an evaluation date `D` only see samples dated in
//! `[D - lookback, D)` whose forward outcome bar is dated on or before `D`.

use std::collections::BTreeMap;
use std::f64::consts::LN_2;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    config::{EmpiricalConfig, GradeTiers, GradingStrategy},
    detectors::Pattern,
    gate::RiskLevels,
    Side,
};

// ============================================================
// GRADES
// ============================================================

/// Quality tier. Orders best-first: `APlus < A < BPlus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GradeTiers {
    /// `None` below the B+ floor or for NaN
    pub fn grade(&self, value: f64) -> Option<Grade> {
        if value >= self.a_plus {
            Some(Grade::APlus)
        } else if value >= self.a {
            Some(Grade::A)
        } else if value >= self.b_plus {
            Some(Grade::BPlus)
        } else {
            None
        }
    }
}

// ============================================================
// EMPIRICAL SAMPLES
// ============================================================

/// Where an empirical win rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Pattern,
    Global,
}

impl RateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RateSource::Pattern => "pattern",
            RateSource::Global => "global",
        }
    }
}

/// Weighted win rate with the sample behind it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinRate {
    pub rate: f64,
    /// Raw number of samples
    pub samples: usize,
    /// Sum of recency weights
    pub weight: f64,
    pub source: RateSource,
}

/// One historical candidate with a known forward outcome
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeSample {
    pub pattern: Pattern,
    pub date: NaiveDate,
    /// Date of the bar the forward return was measured on
    pub outcome_date: NaiveDate,
    /// Direction-adjusted forward return
    pub ret: f64,
}

impl OutcomeSample {
    #[inline]
    pub fn is_win(&self) -> bool {
        self.ret > 0.0
    }
}

/// Direction-adjusted return from `closes[index]` to `closes[index + horizon]`.
///
/// `None` when the forward bar is past the end of the series or the entry
/// close is not positive.
pub fn forward_return(closes: &[f64], index: usize, horizon: usize, side: Side) -> Option<f64> {
    let entry = *closes.get(index)?;
    let exit = *closes.get(index.checked_add(horizon)?)?;
    if !(entry > 0.0) {
        return None;
    }
    Some(side.sign() * (exit - entry) / entry)
}

/// Exponential decay weight for a sample `age_days` old
#[inline]
pub fn recency_weight(age_days: f64, half_life_days: f64) -> f64 {
    (-(LN_2 / half_life_days) * age_days).exp()
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    count: usize,
    weight: f64,
    win_weight: f64,
}

impl Tally {
    fn add(&mut self, w: f64, win: bool) {
        self.count += 1;
        self.weight += w;
        if win {
            self.win_weight += w;
        }
    }

    fn rate(&self, source: RateSource) -> Option<WinRate> {
        if !(self.weight > 0.0) {
            return None;
        }
        Some(WinRate {
            rate: self.win_weight / self.weight,
            samples: self.count,
            weight: self.weight,
            source,
        })
    }
}

/// Per-pattern and global tallies as of one evaluation date
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    as_of: NaiveDate,
    min_samples: f64,
    per_pattern: BTreeMap<Pattern, Tally>,
    global: Tally,
}

impl RateSnapshot {
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Pattern rate, or the global rate when the pattern's weighted count is
    /// below the minimum. `None` when neither is defined.
    pub fn rate_for(&self, pattern: Pattern) -> Option<WinRate> {
        let own = self.per_pattern.get(&pattern).copied().unwrap_or_default();
        if own.weight >= self.min_samples {
            if let Some(rate) = own.rate(RateSource::Pattern) {
                return Some(rate);
            }
        }
        tracing::debug!(
            pattern = %pattern,
            as_of = %self.as_of,
            weight = own.weight,
            "pattern sample too thin, using global rate"
        );
        self.global.rate(RateSource::Global)
    }

    pub fn global(&self) -> Option<WinRate> {
        self.global.rate(RateSource::Global)
    }
}

/// Historical outcome samples, sorted by date
#[derive(Debug, Clone)]
pub struct EmpiricalGrader {
    config: EmpiricalConfig,
    samples: Vec<OutcomeSample>,
}

impl EmpiricalGrader {
    pub fn new(config: EmpiricalConfig, mut samples: Vec<OutcomeSample>) -> Self {
        samples.sort_by(|a, b| a.date.cmp(&b.date).then(a.pattern.cmp(&b.pattern)));
        Self { config, samples }
    }

    pub fn config(&self) -> &EmpiricalConfig {
        &self.config
    }

    pub fn samples(&self) -> &[OutcomeSample] {
        &self.samples
    }

    /// Tally every sample visible from `as_of`
    pub fn snapshot(&self, as_of: NaiveDate) -> RateSnapshot {
        let start = as_of
            .checked_sub_signed(Duration::days(i64::from(self.config.lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        let lo = self.samples.partition_point(|s| s.date < start);
        let hi = self.samples.partition_point(|s| s.date < as_of);

        let mut per_pattern: BTreeMap<Pattern, Tally> = BTreeMap::new();
        let mut global = Tally::default();
        for sample in &self.samples[lo..hi] {
            if sample.outcome_date > as_of {
                continue;
            }
            let age = (as_of - sample.date).num_days() as f64;
            let w = recency_weight(age, self.config.half_life_days);
            per_pattern
                .entry(sample.pattern)
                .or_default()
                .add(w, sample.is_win());
            global.add(w, sample.is_win());
        }

        RateSnapshot {
            as_of,
            min_samples: self.config.min_samples,
            per_pattern,
            global,
        }
    }
}

// ============================================================
// GRADER
// ============================================================

/// Grade plus the empirical evidence behind it, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeOutcome {
    pub grade: Grade,
    pub win_rate: Option<f64>,
    pub samples: Option<usize>,
    pub source: Option<RateSource>,
}

impl GradeOutcome {
    fn from_rate(grade: Grade, rate: WinRate) -> Self {
        Self {
            grade,
            win_rate: Some(rate.rate),
            samples: Some(rate.samples),
            source: Some(rate.source),
        }
    }
}

/// Grading strategy bound to its historical samples.
///
/// Empirical snapshots are cached per evaluation date, so a run grading
/// many candidates on the same day tallies the history once.
#[derive(Debug, Clone)]
pub enum Grader {
    Static(GradeTiers),
    Empirical {
        grader: EmpiricalGrader,
        snapshots: BTreeMap<NaiveDate, RateSnapshot>,
    },
}

impl Grader {
    /// `samples` is ignored by the static strategy
    pub fn new(strategy: &GradingStrategy, samples: Vec<OutcomeSample>) -> Self {
        match strategy {
            GradingStrategy::Static { tiers } => Grader::Static(*tiers),
            GradingStrategy::Empirical(cfg) => Grader::Empirical {
                grader: EmpiricalGrader::new(cfg.clone(), samples),
                snapshots: BTreeMap::new(),
            },
        }
    }

    /// `None` when the setup falls below the lowest tier or no rate is defined
    pub fn grade(
        &mut self,
        pattern: Pattern,
        date: NaiveDate,
        levels: &RiskLevels,
    ) -> Option<GradeOutcome> {
        match self {
            Grader::Static(tiers) => tiers.grade(levels.rr).map(|grade| GradeOutcome {
                grade,
                win_rate: None,
                samples: None,
                source: None,
            }),
            Grader::Empirical { grader, snapshots } => {
                let snapshot = snapshots
                    .entry(date)
                    .or_insert_with(|| grader.snapshot(date));
                let rate = snapshot.rate_for(pattern)?;
                grader
                    .config()
                    .tiers
                    .grade(rate.rate)
                    .map(|grade| GradeOutcome::from_rate(grade, rate))
            }
        }
    }
}

// ============================================================
// TESTS
// ============================================================
