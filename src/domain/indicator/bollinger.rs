//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are undefined.

use crate::domain::error::QuantboardError;
use crate::domain::indicator::stddev::rolling_stddev;
use crate::domain::indicator::{
    rolling_mean, validate_window, Band, IndicatorSeries, IndicatorType,
};
use crate::domain::ohlcv::PriceSeries;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

pub fn calculate_bollinger(
    series: &PriceSeries,
    period: usize,
    multiplier: f64,
) -> Result<BollingerBands, QuantboardError> {
    validate_window("bollinger period", period, series.len())?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(QuantboardError::invalid_parameter(
            "bollinger multiplier",
            format!("multiplier must be a non-negative number, got {multiplier}"),
        ));
    }

    let closes = series.closes();
    let middle = rolling_mean(&closes, period);
    let stddev = rolling_stddev(&closes, period);

    let mut upper = Vec::with_capacity(closes.len());
    let mut lower = Vec::with_capacity(closes.len());
    for (mid, sd) in middle.iter().zip(&stddev) {
        match (mid, sd) {
            (Some(m), Some(s)) => {
                upper.push(Some(m + multiplier * s));
                lower.push(Some(m - multiplier * s));
            }
            _ => {
                upper.push(None);
                lower.push(None);
            }
        }
    }

    let stddev_mult_x100 = (multiplier * 100.0).round() as u32;
    let kind = |band| IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
        band,
    };

    Ok(BollingerBands {
        upper: IndicatorSeries::from_values(kind(Band::Upper), series, upper),
        middle: IndicatorSeries::from_values(kind(Band::Middle), series, middle),
        lower: IndicatorSeries::from_values(kind(Band::Lower), series, lower),
    })
}
