//! CSV file price adapter.
//!
//! One file per ticker and interval: `<dir>/<TICKER>_<interval>.csv` with
//! header `timestamp,open,high,low,close,volume`.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use crate::domain::error::QuantboardError;
use crate::domain::ohlcv::{Interval, PriceBar, PriceSeries};
use crate::ports::data_port::DataPort;

#[derive(Debug)]
pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str, interval: Interval) -> PathBuf {
        self.base_path.join(format!("{ticker}_{interval}.csv"))
    }
}

/// Accepts `YYYY-MM-DD` (midnight) or `YYYY-MM-DD HH:MM:SS`.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<PriceSeries, QuantboardError> {
        let path = self.csv_path(ticker, interval);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QuantboardError::NoData {
                    ticker: ticker.to_string(),
                    interval: interval.to_string(),
                });
            }
            Err(e) => {
                return Err(QuantboardError::DataSource {
                    reason: format!("failed to read {}: {e}", path.display()),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (i, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| QuantboardError::DataSource {
                reason: format!("{}: CSV parse error: {e}", path.display()),
            })?;
            let timestamp =
                parse_timestamp(&row.timestamp).ok_or_else(|| QuantboardError::DataSource {
                    reason: format!(
                        "{}: invalid timestamp '{}' at row {}",
                        path.display(),
                        row.timestamp,
                        i + 1
                    ),
                })?;

            let date = timestamp.date();
            if date < start || date > end {
                continue;
            }

            bars.push(PriceBar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        if bars.is_empty() {
            return Err(QuantboardError::NoData {
                ticker: ticker.to_string(),
                interval: interval.to_string(),
            });
        }

        debug!(ticker, %interval, bars = bars.len(), path = %path.display(), "loaded prices");
        PriceSeries::new(bars)
    }

    fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, QuantboardError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| QuantboardError::DataSource {
            reason: format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ),
        })?;

        let suffix = format!("_{interval}.csv");
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| QuantboardError::DataSource {
                reason: format!("directory entry error: {e}"),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(ticker) = name_str.strip_suffix(&suffix) {
                if !ticker.is_empty() {
                    symbols.push(ticker.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
