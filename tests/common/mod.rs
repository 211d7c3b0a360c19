#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use quantboard::domain::error::QuantboardError;
pub use quantboard::domain::ohlcv::{Interval, PriceBar, PriceSeries};
use quantboard::ports::data_port::DataPort;
use std::cell::Cell;
use std::collections::HashMap;

/// In-memory price source keyed by ticker. Bars outside the requested range
/// are dropped the same way the CSV adapter drops them.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_closes(self, ticker: &str, closes: &[f64]) -> Self {
        self.with_bars(ticker, bars_from_closes(closes))
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<PriceSeries, QuantboardError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(reason) = self.errors.get(ticker) {
            return Err(QuantboardError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars: Vec<PriceBar> = self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp.date() >= start && b.timestamp.date() <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(QuantboardError::NoData {
                ticker: ticker.to_string(),
                interval: interval.to_string(),
            });
        }
        PriceSeries::new(bars)
    }

    fn list_symbols(&self, _interval: Interval) -> Result<Vec<String>, QuantboardError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily midnight timestamps starting 2024-01-01.
pub fn ts(i: usize) -> NaiveDateTime {
    (date(2024, 1, 1) + chrono::Duration::days(i as i64))
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(i: usize, close: f64) -> PriceBar {
    PriceBar {
        timestamp: ts(i),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c))
        .collect()
}

pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
    PriceSeries::new(bars_from_closes(closes)).unwrap()
}

/// Deterministic oscillating series with drift.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.25).sin() * 10.0 + i as f64 * 0.05)
        .collect()
}

/// CSV text in the on-disk price file format.
pub fn price_csv(closes: &[f64]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for (i, c) in closes.iter().enumerate() {
        out.push_str(&format!(
            "{},{c},{},{},{c},1000\n",
            ts(i).date(),
            c + 1.0,
            c - 1.0
        ));
    }
    out
}
