//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are undefined.

use crate::domain::error::QuantboardError;
use crate::domain::indicator::{validate_window, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceSeries;

pub fn calculate_ema(series: &PriceSeries, period: usize) -> Result<IndicatorSeries, QuantboardError> {
    validate_window("ema period", period, series.len())?;
    let raw = ema_values(&series.closes(), period);
    Ok(IndicatorSeries::from_values(
        IndicatorType::Ema(period),
        series,
        raw,
    ))
}

/// EMA over a raw slice. Callers validate `period`.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if period == 0 {
        out.resize(values.len(), None);
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i + 1 < period {
            sum += value;
            out.push(None);
        } else if i + 1 == period {
            sum += value;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = value * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }
    out
}

/// EMA over a series with a leading undefined span; the recurrence starts at
/// the first defined entry.
pub(crate) fn ema_of_defined(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let start = values.iter().position(Option::is_some).unwrap_or(values.len());
    let tail: Vec<f64> = values[start..].iter().map(|v| v.unwrap_or(0.0)).collect();

    let mut out = vec![None; start];
    out.extend(ema_values(&tail, period));
    out
}
