//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]).
//! Warmup: first (n-1) bars are undefined.

use crate::domain::error::QuantboardError;
use crate::domain::indicator::{rolling_mean, validate_window, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceSeries;

pub fn calculate_sma(series: &PriceSeries, period: usize) -> Result<IndicatorSeries, QuantboardError> {
    validate_window("sma period", period, series.len())?;
    let raw = rolling_mean(&series.closes(), period);
    Ok(IndicatorSeries::from_values(
        IndicatorType::Sma(period),
        series,
        raw,
    ))
}
