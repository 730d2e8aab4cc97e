//! RSI extremes screen
//!
//! Flags tickers whose latest RSI sits at or beyond the oversold/overbought
//! levels. The result seeds the `oversold`/`overbought` group tags of the
//! next scan.

use std::io::Write;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::{
    indicators::IndicatorFrame,
    pipeline::ScanEngine,
    table::{fmt_num, fmt_opt, PriceTable, TickerSeries},
    Group, Result, Side,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeRow {
    pub ticker: String,
    pub rsi: f64,
    /// Long when oversold, short when overbought
    pub side: Side,
    pub close: f64,
    /// Date of the ticker's last bar
    pub as_of: NaiveDate,
    pub atr: Option<f64>,
    pub ma_fast: Option<f64>,
    pub ma_slow: Option<f64>,
}

impl ExtremeRow {
    /// Group tag this row feeds
    pub fn group(&self) -> Group {
        match self.side {
            Side::Long => Group::Oversold,
            Side::Short => Group::Overbought,
        }
    }
}

/// Screen result, sorted by side then ticker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtremeTable {
    rows: Vec<ExtremeRow>,
}

impl ExtremeTable {
    pub fn rows(&self) -> &[ExtremeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flagged tickers, one per row
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.ticker.as_str())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record([
            "Ticker", "RSI14", "Side", "Close", "AsOf", "ATR20", "MA50", "MA200",
        ])?;
        for row in &self.rows {
            wtr.write_record([
                row.ticker.clone(),
                fmt_num(row.rsi, 2),
                row.side.to_string(),
                fmt_num(row.close, 2),
                row.as_of.to_string(),
                fmt_opt(row.atr, 2),
                fmt_opt(row.ma_fast, 2),
                fmt_opt(row.ma_slow, 2),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ScanEngine {
    /// Latest-bar RSI extremes across the table
    pub fn screen_extremes(&self, table: &PriceTable) -> ExtremeTable {
        let mut rows: Vec<ExtremeRow> = table
            .series()
            .par_iter()
            .filter_map(|series| self.screen_series(series))
            .collect();
        rows.sort_by(|a, b| (a.side, &a.ticker).cmp(&(b.side, &b.ticker)));

        tracing::info!(
            tickers = table.ticker_count(),
            flagged = rows.len(),
            "extremes screen complete"
        );
        ExtremeTable { rows }
    }

    fn screen_series(&self, series: &TickerSeries) -> Option<ExtremeRow> {
        let ind = &self.config().indicators;
        let min_len = ind.rsi_period.get().max(ind.atr_period.get()) + 1;
        if series.len() < min_len {
            return None;
        }

        let frame = IndicatorFrame::compute(&series.bars, ind);
        let last = series.len() - 1;
        let bar = frame.bar(last)?;
        let row = frame.row(last)?;
        let rsi = row.rsi?;

        let levels = &self.config().screen;
        let side = if rsi <= levels.oversold {
            Side::Long
        } else if rsi >= levels.overbought {
            Side::Short
        } else {
            return None;
        };

        Some(ExtremeRow {
            ticker: series.ticker.clone(),
            rsi,
            side,
            close: bar.close,
            as_of: bar.date,
            atr: row.atr,
            ma_fast: row.ma_fast,
            ma_slow: row.ma_slow,
        })
    }
}
