//! Donchian channel over prior bars.
//!
//! Upper(n)[i] = max(H[i-n..i]), Lower(m)[i] = min(L[i-m..i]).
//! The current bar is excluded so a close can be compared against the channel
//! it is breaking out of. Warmup: first n (resp. m) bars are undefined.

use crate::domain::error::QuantboardError;
use crate::domain::indicator::{validate_window, Band, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct DonchianChannel {
    pub upper: IndicatorSeries,
    pub lower: IndicatorSeries,
}

pub fn calculate_donchian(
    series: &PriceSeries,
    upper_period: usize,
    lower_period: usize,
) -> Result<DonchianChannel, QuantboardError> {
    validate_window("donchian entry period", upper_period, series.len())?;
    validate_window("donchian exit period", lower_period, series.len())?;

    let upper = prior_extreme(&series.highs(), upper_period, f64::max);
    let lower = prior_extreme(&series.lows(), lower_period, f64::min);

    Ok(DonchianChannel {
        upper: IndicatorSeries::from_values(
            IndicatorType::Donchian {
                period: upper_period,
                band: Band::Upper,
            },
            series,
            upper,
        ),
        lower: IndicatorSeries::from_values(
            IndicatorType::Donchian {
                period: lower_period,
                band: Band::Lower,
            },
            series,
            lower,
        ),
    })
}

fn prior_extreme(values: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i < period {
                None
            } else {
                values[i - period..i].iter().copied().reduce(pick)
            }
        })
        .collect()
}
