//! Price table ingestion
//!
//! A [`PriceTable`] is the validated, per-ticker partitioned form of the
//! input: every bar checked, tickers normalized, each series sorted by date
//! with no duplicate dates. Structural problems fail here, before any
//! indicator runs.

use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::{EngineError, Group, OHLCVExt, PriceBar, Result};

const REQUIRED_COLUMNS: [&str; 7] = ["date", "ticker", "group", "open", "high", "low", "close"];

// ============================================================
// TABLE TYPES
// ============================================================

/// One ticker's bars, ascending by date
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSeries {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

impl TickerSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// Validated input, partitioned by ticker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    series: Vec<TickerSeries>,
    latest: Option<NaiveDate>,
}

impl PriceTable {
    /// Validate and partition raw bars. An empty vector is a valid empty table.
    pub fn new(mut bars: Vec<PriceBar>) -> Result<Self> {
        for (index, bar) in bars.iter_mut().enumerate() {
            bar.validate().map_err(|e| match e {
                EngineError::InvalidOHLCV { reason, .. } => {
                    EngineError::InvalidOHLCV { index, reason }
                }
                other => other,
            })?;
            bar.ticker = normalize_ticker(&bar.ticker)?;
        }

        bars.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));

        let latest = bars.iter().map(|b| b.date).max();
        let mut series: Vec<TickerSeries> = Vec::new();
        for bar in bars {
            match series.last_mut() {
                Some(s) if s.ticker == bar.ticker => {
                    if s.last_date() == Some(bar.date) {
                        return Err(EngineError::MalformedInput(format!(
                            "duplicate row for {} on {}",
                            bar.ticker, bar.date
                        )));
                    }
                    s.bars.push(bar);
                }
                _ => series.push(TickerSeries {
                    ticker: bar.ticker.clone(),
                    bars: vec![bar],
                }),
            }
        }

        Ok(Self { series, latest })
    }

    /// Parse a CSV source with a header row.
    ///
    /// Required columns (case-insensitive): Date, Ticker, Group, Open, High,
    /// Low, Close. `Volume` is optional; other columns are ignored. Row
    /// numbers in errors count data rows from 0.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.is_empty() {
            return Err(EngineError::MalformedInput("no header row".into()));
        }
        let columns = ColumnMap::resolve(&headers)?;

        let mut bars = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let bar = columns.parse(&record).map_err(|reason| EngineError::MalformedRow {
                row,
                reason,
            })?;
            bar.validate().map_err(|e| EngineError::MalformedRow {
                row,
                reason: e.to_string(),
            })?;
            bars.push(bar);
        }

        tracing::debug!(rows = bars.len(), "parsed price table");
        Self::new(bars)
    }

    pub fn series(&self) -> &[TickerSeries] {
        &self.series
    }

    pub fn get(&self, ticker: &str) -> Option<&TickerSeries> {
        self.series
            .binary_search_by(|s| s.ticker.as_str().cmp(ticker))
            .ok()
            .map(|i| &self.series[i])
    }

    /// Latest date across all tickers
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.latest
    }

    pub fn ticker_count(&self) -> usize {
        self.series.len()
    }

    /// Total bar count
    pub fn len(&self) -> usize {
        self.series.iter().map(TickerSeries::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

// ============================================================
// CSV PARSING
// ============================================================

struct ColumnMap {
    date: usize,
    ticker: usize,
    group: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let missing: Vec<&'static str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|&name| find(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::MissingColumns(missing));
        }

        let idx = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            date: idx("date"),
            ticker: idx("ticker"),
            group: idx("group"),
            open: idx("open"),
            high: idx("high"),
            low: idx("low"),
            close: idx("close"),
            volume: find("volume"),
        })
    }

    fn parse(&self, record: &csv::StringRecord) -> std::result::Result<PriceBar, String> {
        let field = |i: usize, name: &str| {
            record
                .get(i)
                .ok_or_else(|| format!("missing {name} field"))
        };
        let number = |i: usize, name: &str| -> std::result::Result<f64, String> {
            let raw = field(i, name)?;
            raw.parse::<f64>()
                .map_err(|_| format!("invalid {name} value {raw:?}"))
        };

        let volume = match self.volume.and_then(|i| record.get(i)) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<f64>()
                    .map_err(|_| format!("invalid volume value {raw:?}"))?,
            ),
        };

        Ok(PriceBar {
            date: parse_date(field(self.date, "date")?)?,
            ticker: field(self.ticker, "ticker")?.to_string(),
            group: field(self.group, "group")?
                .parse::<Group>()
                .map_err(|e| e.to_string())?,
            open: number(self.open, "open")?,
            high: number(self.high, "high")?,
            low: number(self.low, "low")?,
            close: number(self.close, "close")?,
            volume,
        })
    }
}

/// `YYYY-MM-DD`, optionally with a time component that is dropped
fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| format!("unparseable date {raw:?}"))
}

/// Uppercase, with `.`, `/` and spaces mapped to `-` (`brk.b` -> `BRK-B`)
pub fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '.' | '/' | ' ' => '-',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    if ticker.is_empty() || !ticker.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(EngineError::MalformedInput(format!(
            "invalid ticker symbol {raw:?}"
        )));
    }
    Ok(ticker)
}

// ============================================================
// OUTPUT FORMATTING
// ============================================================

/// Fixed-precision number; empty cell for missing values
pub(crate) fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map(|v| fmt_num(v, precision)).unwrap_or_default()
}

pub(crate) fn fmt_num(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

pub(crate) fn fmt_bool(value: Option<bool>) -> String {
    match value {
        Some(true) => "1".to_string(),
        Some(false) => "0".to_string(),
        None => String::new(),
    }
}

// ============================================================
// TESTS
// ============================================================
