//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: line from slow - 1, signal and histogram from slow - 1 + signal - 1.

use crate::domain::error::QuantboardError;
use crate::domain::indicator::ema::{ema_of_defined, ema_values};
use crate::domain::indicator::{validate_window, IndicatorSeries, IndicatorType, MacdComponent};
use crate::domain::ohlcv::PriceSeries;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub line: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
}

pub fn calculate_macd(
    series: &PriceSeries,
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<MacdOutput, QuantboardError> {
    validate_window("macd fast", fast, series.len())?;
    validate_window("macd slow", slow, series.len())?;
    if fast >= slow {
        return Err(QuantboardError::invalid_parameter(
            "macd fast",
            format!("fast ({fast}) must be less than slow ({slow})"),
        ));
    }
    if signal_period < 1 {
        return Err(QuantboardError::invalid_parameter(
            "macd signal",
            "window must be at least 1",
        ));
    }

    let closes = series.closes();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();
    let signal = ema_of_defined(&line, signal_period);
    let histogram: Vec<Option<f64>> = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| match (l, s) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        })
        .collect();

    let kind = |component| IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
        component,
    };

    Ok(MacdOutput {
        line: IndicatorSeries::from_values(kind(MacdComponent::Line), series, line),
        signal: IndicatorSeries::from_values(kind(MacdComponent::Signal), series, signal),
        histogram: IndicatorSeries::from_values(kind(MacdComponent::Histogram), series, histogram),
    })
}
