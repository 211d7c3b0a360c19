//! Rolling standard deviation indicator.
//!
//! Population standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
//! Warmup: first (n-1) bars are undefined.

use crate::domain::error::QuantboardError;
use crate::domain::indicator::{validate_window, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceSeries;

pub fn calculate_stddev(series: &PriceSeries, period: usize) -> Result<IndicatorSeries, QuantboardError> {
    validate_window("stddev period", period, series.len())?;
    let raw = rolling_stddev(&series.closes(), period);
    Ok(IndicatorSeries::from_values(
        IndicatorType::Stddev(period),
        series,
        raw,
    ))
}

pub(crate) fn rolling_stddev(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if period == 0 || i + 1 < period {
            out.push(None);
            continue;
        }
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        out.push(Some(variance.sqrt()));
    }
    out
}
