//! Technical indicator implementations.
//!
//! Every indicator is a pure function of a [`PriceSeries`] and a few numeric
//! parameters. Outputs are [`IndicatorSeries`] aligned 1:1 with the input
//! bars; entries inside the warm-up window are `None`.
//!
//! - `IndicatorType`: indicator identity + parameters (also usable as a map key)
//! - `IndicatorPoint`: one timestamped, possibly undefined value
//! - `IndicatorSeries`: a full aligned output series

pub mod bollinger;
pub mod donchian;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::{calculate_bollinger, BollingerBands};
pub use donchian::{calculate_donchian, DonchianChannel};
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdOutput};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::error::QuantboardError;
use crate::domain::ohlcv::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Band {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MacdComponent {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Stddev(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
        component: MacdComponent,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
        band: Band,
    },
    Donchian {
        period: usize,
        band: Band,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Zips raw values with the series timestamps.
    pub(crate) fn from_values(
        indicator_type: IndicatorType,
        series: &PriceSeries,
        raw: Vec<Option<f64>>,
    ) -> Self {
        let values = series
            .bars()
            .iter()
            .zip(raw)
            .map(|(bar, value)| IndicatorPoint {
                timestamp: bar.timestamp,
                value,
            })
            .collect();
        Self {
            indicator_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).and_then(|p| p.value)
    }

    /// Number of leading undefined entries.
    pub fn warmup(&self) -> usize {
        self.values
            .iter()
            .take_while(|p| p.value.is_none())
            .count()
    }

    pub fn raw(&self) -> Vec<Option<f64>> {
        self.values.iter().map(|p| p.value).collect()
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Upper => write!(f, "upper"),
            Band::Middle => write!(f, "middle"),
            Band::Lower => write!(f, "lower"),
        }
    }
}

impl fmt::Display for MacdComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacdComponent::Line => write!(f, "line"),
            MacdComponent::Signal => write!(f, "signal"),
            MacdComponent::Histogram => write!(f, "histogram"),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Macd {
                fast,
                slow,
                signal,
                component,
            } => write!(f, "MACD({},{},{}).{}", fast, slow, signal, component),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
                band,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{}).{}", period, mult, band)
            }
            IndicatorType::Donchian { period, band } => {
                write!(f, "DONCHIAN({}).{}", period, band)
            }
        }
    }
}

/// Window lengths must be positive and fit inside the series.
pub fn validate_window(name: &str, window: usize, len: usize) -> Result<(), QuantboardError> {
    if window < 1 {
        return Err(QuantboardError::invalid_parameter(
            name,
            "window must be at least 1",
        ));
    }
    if window > len {
        return Err(QuantboardError::invalid_parameter(
            name,
            format!("window {window} exceeds series length {len}"),
        ));
    }
    Ok(())
}

/// Trailing arithmetic mean; first `period - 1` entries are `None`.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i + 1 < period {
            out.push(None);
        } else {
            let window = &values[i + 1 - period..=i];
            out.push(Some(window.iter().sum::<f64>() / period as f64));
        }
    }
    out
}
