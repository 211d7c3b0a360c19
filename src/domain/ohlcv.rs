//! Price bar and price series representation.
//!
//! A [`PriceSeries`] is the contract every other component relies on: bars in
//! strictly increasing timestamp order with internally consistent OHLC values.
//! The series is validated once on construction and is immutable afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::error::QuantboardError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    fn check(&self, row: usize) -> Result<(), QuantboardError> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(QuantboardError::data_integrity(format!(
                "non-finite value at row {row} ({})",
                self.timestamp
            )));
        }
        if self.close <= 0.0 {
            return Err(QuantboardError::data_integrity(format!(
                "non-positive close {} at row {row} ({})",
                self.close, self.timestamp
            )));
        }
        if self.high < self.open.max(self.close).max(self.low) {
            return Err(QuantboardError::data_integrity(format!(
                "high {} below open/close/low at row {row} ({})",
                self.high, self.timestamp
            )));
        }
        if self.low > self.open.min(self.close).min(self.high) {
            return Err(QuantboardError::data_integrity(format!(
                "low {} above open/close/high at row {row} ({})",
                self.low, self.timestamp
            )));
        }
        Ok(())
    }
}

/// Ordered, validated sequence of bars for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validates ordering and bar consistency. Never sorts or dedupes.
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, QuantboardError> {
        if bars.is_empty() {
            return Err(QuantboardError::data_integrity("price series is empty"));
        }
        for (i, bar) in bars.iter().enumerate() {
            bar.check(i)?;
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(QuantboardError::data_integrity(format!(
                    "timestamps not strictly increasing at row {i} ({} after {})",
                    bar.timestamp,
                    bars[i - 1].timestamp
                )));
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn first(&self) -> &PriceBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }
}

/// Bar frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Interval::Daily => 252.0,
            Interval::Weekly => 52.0,
            Interval::Monthly => 12.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = QuantboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(Interval::Daily),
            "1wk" => Ok(Interval::Weekly),
            "1mo" => Ok(Interval::Monthly),
            other => Err(QuantboardError::invalid_parameter(
                "interval",
                format!("unknown interval '{other}' (expected 1d, 1wk or 1mo)"),
            )),
        }
    }
}
