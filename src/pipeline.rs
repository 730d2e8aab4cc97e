//! Scan pipeline
//!
//! `Load -> Annotate -> Detect -> Gate -> BuildHistoricalSample -> Grade -> Emit`
//!
//! Tickers are independent up to grading, so annotation, detection and
//! gating run per ticker in parallel. Empirical grading then pools the
//! outcome samples of every ticker. The engine keeps no state between runs.

use std::io::Write;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::{
    config::{
        EvaluationScope, GateConfig, GradingStrategy, IndicatorConfig, LabelPolicy,
        PatternConfig, ScanConfig,
    },
    detectors::{detect_row, BuiltinDetector, Pattern, PatternCandidate},
    gate::{RiskGate, RiskLevels},
    grading::{forward_return, Grade, Grader, OutcomeSample, RateSource},
    indicators::IndicatorFrame,
    table::{fmt_num, fmt_opt, PriceTable, TickerSeries},
    EngineError, Group, Result, Side,
};

/// Column order of the setup table
pub const SETUP_HEADER: [&str; 20] = [
    "Date", "Ticker", "Group", "Pattern", "Side", "Open", "High", "Low", "Close", "RSI14", "H3",
    "L3", "Stop", "Target", "Risk", "R_R", "Grade", "WinRate", "Samples", "RateSource",
];

// ============================================================
// PIPELINE RECORDS
// ============================================================

/// A candidate that passed the risk/reward gate, with its entry bar
#[derive(Debug, Clone, PartialEq)]
pub struct GatedCandidate {
    pub candidate: PatternCandidate,
    pub group: Group,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub rsi: Option<f64>,
    /// H3
    pub stop_high: Option<f64>,
    /// L3
    pub stop_low: Option<f64>,
    pub levels: RiskLevels,
}

impl GatedCandidate {
    #[inline]
    pub fn pattern(&self) -> Pattern {
        self.candidate.pattern
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.candidate.side()
    }

    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.candidate.date
    }

    #[inline]
    pub fn ticker(&self) -> &str {
        &self.candidate.ticker
    }
}

/// One output row
#[derive(Debug, Clone, PartialEq)]
pub struct GradedSetup {
    pub setup: GatedCandidate,
    pub grade: Grade,
    pub win_rate: Option<f64>,
    pub samples: Option<usize>,
    pub rate_source: Option<RateSource>,
}

impl GradedSetup {
    fn sort_key(&self) -> (Side, Grade, &str, NaiveDate, Pattern) {
        (
            self.setup.side(),
            self.grade,
            self.setup.ticker(),
            self.setup.date(),
            self.setup.pattern(),
        )
    }

    fn csv_record(&self) -> Vec<String> {
        let s = &self.setup;
        vec![
            s.date().to_string(),
            s.ticker().to_string(),
            s.group.to_string(),
            s.pattern().to_string(),
            s.side().to_string(),
            fmt_num(s.open, 4),
            fmt_num(s.high, 4),
            fmt_num(s.low, 4),
            fmt_num(s.close, 4),
            fmt_opt(s.rsi, 2),
            fmt_opt(s.stop_high, 4),
            fmt_opt(s.stop_low, 4),
            fmt_num(s.levels.stop, 4),
            fmt_num(s.levels.target, 4),
            fmt_num(s.levels.risk, 4),
            fmt_num(s.levels.rr, 2),
            self.grade.to_string(),
            fmt_opt(self.win_rate, 4),
            self.samples.map(|n| n.to_string()).unwrap_or_default(),
            self.rate_source
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
        ]
    }
}

/// Graded setups in output order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetupTable {
    rows: Vec<GradedSetup>,
}

impl SetupTable {
    pub fn rows(&self) -> &[GradedSetup] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GradedSetup> {
        self.rows.iter()
    }

    /// Write the table as CSV. The header is written even when there are no rows.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(SETUP_HEADER)?;
        for row in &self.rows {
            wtr.write_record(row.csv_record())?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SetupTable {
    type Item = &'a GradedSetup;
    type IntoIter = std::slice::Iter<'a, GradedSetup>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Per-ticker output of annotate/detect/gate
#[derive(Debug, Clone, Default)]
pub struct SeriesScan {
    /// Candidates before the gate
    pub detected: usize,
    pub gated: Vec<GatedCandidate>,
    /// Forward outcomes of gated candidates, for empirical grading
    pub samples: Vec<OutcomeSample>,
}

// ============================================================
// ENGINE
// ============================================================

/// Configured scan engine. Build with [`EngineBuilder`].
#[derive(Debug, Clone)]
pub struct ScanEngine {
    config: ScanConfig,
    detectors: Vec<BuiltinDetector>,
    gate: RiskGate,
}

impl ScanEngine {
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.detectors
    }

    pub fn gate(&self) -> &RiskGate {
        &self.gate
    }

    // ===========================================
    // LOW-LEVEL API: one ticker, one row
    // ===========================================

    /// Compute indicator rows for one ticker
    pub fn annotate<'a>(&self, series: &'a TickerSeries) -> IndicatorFrame<'a> {
        IndicatorFrame::compute(&series.bars, &self.config.indicators)
    }

    /// Patterns firing at `index`, after the label policy
    pub fn detect_at(&self, frame: &IndicatorFrame<'_>, index: usize) -> Vec<Pattern> {
        self.config
            .label_policy
            .apply(detect_row(&self.detectors, frame, index))
    }

    // ===========================================
    // MID-LEVEL API: one ticker
    // ===========================================

    /// Every candidate in the frame, in date order
    pub fn detect(&self, frame: &IndicatorFrame<'_>) -> Vec<PatternCandidate> {
        let mut out = Vec::new();
        for (index, bar) in frame.bars().iter().enumerate() {
            for pattern in self.detect_at(frame, index) {
                out.push(PatternCandidate {
                    ticker: bar.ticker.clone(),
                    date: bar.date,
                    index,
                    pattern,
                });
            }
        }
        out
    }

    /// Attach stop/target and drop candidates the gate rejects
    pub fn gate_candidates(
        &self,
        frame: &IndicatorFrame<'_>,
        candidates: Vec<PatternCandidate>,
    ) -> Vec<GatedCandidate> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let bar = frame.bar(candidate.index)?;
                let row = frame.row(candidate.index)?;
                let levels = self.gate.evaluate(candidate.side(), bar.close, row)?;
                Some(GatedCandidate {
                    group: bar.group,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    rsi: row.rsi,
                    stop_high: row.stop_high,
                    stop_low: row.stop_low,
                    levels,
                    candidate,
                })
            })
            .collect()
    }

    /// Annotate, detect and gate one ticker; collect outcome samples when
    /// grading is empirical
    pub fn scan_series(&self, series: &TickerSeries) -> SeriesScan {
        let frame = self.annotate(series);
        let candidates = self.detect(&frame);
        let detected = candidates.len();
        let gated = self.gate_candidates(&frame, candidates);

        let samples = match &self.config.grading {
            GradingStrategy::Empirical(cfg) => {
                let closes = series.closes();
                let horizon = cfg.horizon.get();
                gated
                    .iter()
                    .filter_map(|g| {
                        let index = g.candidate.index;
                        let ret = forward_return(&closes, index, horizon, g.side())?;
                        let outcome_date = series.bars.get(index.checked_add(horizon)?)?.date;
                        Some(OutcomeSample {
                            pattern: g.pattern(),
                            date: g.date(),
                            outcome_date,
                            ret,
                        })
                    })
                    .collect()
            }
            GradingStrategy::Static { .. } => Vec::new(),
        };

        tracing::debug!(
            ticker = %series.ticker,
            bars = series.len(),
            detected,
            gated = gated.len(),
            samples = samples.len(),
            "scanned ticker"
        );

        SeriesScan {
            detected,
            gated,
            samples,
        }
    }

    // ===========================================
    // HIGH-LEVEL API: whole table
    // ===========================================

    /// Gated candidates of every ticker, in ticker order
    pub fn scan_all(&self, table: &PriceTable) -> Vec<SeriesScan> {
        table
            .series()
            .par_iter()
            .map(|series| self.scan_series(series))
            .collect()
    }

    /// Run the full pipeline and return graded setups in output order
    pub fn run(&self, table: &PriceTable) -> Result<SetupTable> {
        let scans = self.scan_all(table);

        let detected: usize = scans.iter().map(|s| s.detected).sum();
        let samples: Vec<OutcomeSample> = scans
            .iter()
            .flat_map(|s| s.samples.iter().cloned())
            .collect();
        let sample_count = samples.len();

        let latest = table.latest_date();
        let scope = self.config.scope;
        let candidates: Vec<GatedCandidate> = scans
            .into_iter()
            .flat_map(|s| s.gated)
            .filter(|g| match scope {
                EvaluationScope::Latest => Some(g.date()) == latest,
                EvaluationScope::All => true,
            })
            .collect();
        let gated = candidates.len();

        let mut grader = Grader::new(&self.config.grading, samples);
        let mut rows: Vec<GradedSetup> = candidates
            .into_iter()
            .filter_map(|setup| {
                let outcome = grader.grade(setup.pattern(), setup.date(), &setup.levels)?;
                Some(GradedSetup {
                    setup,
                    grade: outcome.grade,
                    win_rate: outcome.win_rate,
                    samples: outcome.samples,
                    rate_source: outcome.source,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        tracing::info!(
            tickers = table.ticker_count(),
            bars = table.len(),
            detected,
            gated,
            samples = sample_count,
            emitted = rows.len(),
            "scan complete"
        );

        Ok(SetupTable { rows })
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`ScanEngine`]; every section starts at its default
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: ScanConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn indicators(mut self, indicators: IndicatorConfig) -> Self {
        self.config.indicators = indicators;
        self
    }

    pub fn patterns(mut self, patterns: PatternConfig) -> Self {
        self.config.patterns = patterns;
        self
    }

    pub fn gate(mut self, gate: GateConfig) -> Self {
        self.config.gate = gate;
        self
    }

    pub fn grading(mut self, grading: GradingStrategy) -> Self {
        self.config.grading = grading;
        self
    }

    pub fn scope(mut self, scope: EvaluationScope) -> Self {
        self.config.scope = scope;
        self
    }

    pub fn label_policy(mut self, policy: LabelPolicy) -> Self {
        self.config.label_policy = policy;
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> Result<ScanEngine> {
        self.config.validate()?;
        let detectors = BuiltinDetector::from_config(&self.config.patterns);
        if detectors.is_empty() {
            return Err(EngineError::InvalidConfig(
                "every pattern family is disabled".into(),
            ));
        }
        let gate = RiskGate::new(&self.config.gate);
        Ok(ScanEngine {
            config: self.config,
            detectors,
            gate,
        })
    }
}

// ============================================================
// TESTS
// ============================================================
