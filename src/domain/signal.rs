//! Signal generation: indicator series → long/flat position series.
//!
//! Every rule is causal: the position at bar `i` only looks at indicator
//! values at bars `<= i`. A bar whose required inputs are undefined is always
//! flat, and any open position is dropped there.
//!
//! RSI and Bollinger entries are crossings: the previous bar must be defined
//! and on the other side of the threshold, so a series that starts below it
//! stays flat until it crosses.

use chrono::NaiveDateTime;

use crate::domain::error::QuantboardError;
use crate::domain::indicator::{BollingerBands, DonchianChannel, IndicatorSeries};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::position::{Position, PositionSeries};

/// Long while fast SMA > slow SMA.
pub fn sma_crossover(
    fast: &IndicatorSeries,
    slow: &IndicatorSeries,
) -> Result<PositionSeries, QuantboardError> {
    ensure_aligned(fast, slow)?;
    let positions = (0..fast.len())
        .map(|i| match (fast.get(i), slow.get(i)) {
            (Some(f), Some(s)) => Position::from(f > s),
            _ => Position::Flat,
        })
        .collect();
    Ok(PositionSeries::new(&timestamps_of(fast), positions))
}

/// Enter when RSI crosses below `oversold`, hold until it rises above
/// `overbought`.
pub fn rsi_threshold(
    rsi: &IndicatorSeries,
    oversold: f64,
    overbought: f64,
) -> Result<PositionSeries, QuantboardError> {
    validate_thresholds(oversold, overbought)?;
    let positions = hysteresis(rsi.len(), |i| {
        let was_above = previous(i, |p| rsi.get(p)).is_some_and(|prev| prev >= oversold);
        rsi.get(i).map(|r| (was_above && r < oversold, r > overbought))
    });
    Ok(PositionSeries::new(&timestamps_of(rsi), positions))
}

/// Enter when close crosses below the lower band, exit once it recovers above
/// the middle band.
pub fn bollinger_mean_reversion(
    series: &PriceSeries,
    bands: &BollingerBands,
) -> Result<PositionSeries, QuantboardError> {
    ensure_series_aligned(series, &bands.lower)?;
    ensure_series_aligned(series, &bands.middle)?;
    let closes = series.closes();
    let positions = hysteresis(series.len(), |i| {
        let was_above = previous(i, |p| bands.lower.get(p).map(|lower| closes[p] >= lower))
            .unwrap_or(false);
        match (bands.lower.get(i), bands.middle.get(i)) {
            (Some(lower), Some(middle)) => {
                Some((was_above && closes[i] < lower, closes[i] > middle))
            }
            _ => None,
        }
    });
    Ok(PositionSeries::new(&series.timestamps(), positions))
}

/// Enter when close exceeds the prior-n-bar high, exit when it falls below the
/// prior-m-bar low.
pub fn donchian_breakout(
    series: &PriceSeries,
    channel: &DonchianChannel,
) -> Result<PositionSeries, QuantboardError> {
    ensure_series_aligned(series, &channel.upper)?;
    ensure_series_aligned(series, &channel.lower)?;
    let closes = series.closes();
    let positions = hysteresis(series.len(), |i| {
        match (channel.upper.get(i), channel.lower.get(i)) {
            (Some(upper), Some(lower)) => Some((closes[i] > upper, closes[i] < lower)),
            _ => None,
        }
    });
    Ok(PositionSeries::new(&series.timestamps(), positions))
}

pub fn validate_thresholds(oversold: f64, overbought: f64) -> Result<(), QuantboardError> {
    if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
        return Err(QuantboardError::invalid_parameter(
            "rsi thresholds",
            format!("thresholds must lie in [0, 100], got {oversold}/{overbought}"),
        ));
    }
    if oversold >= overbought {
        return Err(QuantboardError::invalid_parameter(
            "rsi thresholds",
            format!("oversold ({oversold}) must be below overbought ({overbought})"),
        ));
    }
    Ok(())
}

/// Two-state machine. `rule(i)` yields `(enter, exit)` or `None` when inputs
/// are undefined at `i`.
fn hysteresis(len: usize, rule: impl Fn(usize) -> Option<(bool, bool)>) -> Vec<Position> {
    let mut state = Position::Flat;
    (0..len)
        .map(|i| {
            state = match (state, rule(i)) {
                (_, None) => Position::Flat,
                (Position::Flat, Some((true, _))) => Position::Long,
                (Position::Long, Some((_, true))) => Position::Flat,
                (current, Some(_)) => current,
            };
            state
        })
        .collect()
}

/// Value at bar `i - 1`, `None` at the first bar.
fn previous<T>(i: usize, at: impl Fn(usize) -> Option<T>) -> Option<T> {
    i.checked_sub(1).and_then(at)
}

fn timestamps_of(series: &IndicatorSeries) -> Vec<NaiveDateTime> {
    series.values.iter().map(|p| p.timestamp).collect()
}

fn ensure_aligned(a: &IndicatorSeries, b: &IndicatorSeries) -> Result<(), QuantboardError> {
    let same = a.len() == b.len()
        && a
            .values
            .iter()
            .zip(&b.values)
            .all(|(x, y)| x.timestamp == y.timestamp);
    if same {
        Ok(())
    } else {
        Err(QuantboardError::data_integrity(format!(
            "{} and {} are not aligned",
            a.indicator_type, b.indicator_type
        )))
    }
}

fn ensure_series_aligned(
    series: &PriceSeries,
    indicator: &IndicatorSeries,
) -> Result<(), QuantboardError> {
    let same = series.len() == indicator.len()
        && series
            .bars()
            .iter()
            .zip(&indicator.values)
            .all(|(bar, p)| bar.timestamp == p.timestamp);
    if same {
        Ok(())
    } else {
        Err(QuantboardError::data_integrity(format!(
            "{} is not aligned with the price series",
            indicator.indicator_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{
        calculate_bollinger, calculate_donchian, calculate_sma, IndicatorPoint, IndicatorType,
    };
    use crate::domain::ohlcv::PriceBar;
    use chrono::NaiveDate;
    use crate::domain::position::Position::{Flat, Long};

    fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn make_series(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: ts(i),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1000.0,
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    fn rsi_series(values: &[Option<f64>]) -> IndicatorSeries {
        IndicatorSeries {
            indicator_type: IndicatorType::Rsi(14),
            values: values
                .iter()
                .enumerate()
                .map(|(i, &value)| IndicatorPoint {
                    timestamp: ts(i),
                    value,
                })
                .collect(),
        }
    }

    #[test]
    fn crossover_waits_for_both_averages() {
        let series = make_series(&[10.0, 11.0, 12.0, 11.0, 13.0]);
        let fast = calculate_sma(&series, 2).unwrap();
        let slow = calculate_sma(&series, 3).unwrap();
        let pos = sma_crossover(&fast, &slow).unwrap();

        assert_eq!(pos.positions(), vec![Flat, Flat, Long, Long, Flat]);
    }

    #[test]
    fn crossover_rejects_misaligned_inputs() {
        let a = make_series(&[1.0, 2.0, 3.0]);
        let b = make_series(&[1.0, 2.0]);
        let fast = calculate_sma(&a, 1).unwrap();
        let slow = calculate_sma(&b, 1).unwrap();
        assert!(sma_crossover(&fast, &slow).unwrap_err().is_data_integrity());
    }

    #[test]
    fn rsi_hysteresis_holds_between_thresholds() {
        let rsi = rsi_series(&[
            None,
            Some(50.0),
            Some(25.0),
            Some(45.0),
            Some(65.0),
            Some(75.0),
            Some(50.0),
        ]);
        let pos = rsi_threshold(&rsi, 30.0, 70.0).unwrap();
        assert_eq!(pos.positions(), vec![Flat, Flat, Long, Long, Long, Flat, Flat]);
    }

    #[test]
    fn rsi_undefined_input_forces_flat() {
        let rsi = rsi_series(&[Some(50.0), Some(20.0), None, Some(50.0)]);
        let pos = rsi_threshold(&rsi, 30.0, 70.0).unwrap();
        assert_eq!(pos.positions(), vec![Flat, Long, Flat, Flat]);
    }

    #[test]
    fn rsi_starting_below_oversold_waits_for_a_cross() {
        let rsi = rsi_series(&[None, Some(20.0), Some(25.0), Some(35.0), Some(28.0)]);
        let pos = rsi_threshold(&rsi, 30.0, 70.0).unwrap();
        assert_eq!(pos.positions(), vec![Flat, Flat, Flat, Flat, Long]);
    }

    #[test]
    fn rsi_reentry_after_gap_needs_a_cross() {
        let rsi = rsi_series(&[Some(50.0), Some(20.0), None, Some(20.0), Some(40.0), Some(29.0)]);
        let pos = rsi_threshold(&rsi, 30.0, 70.0).unwrap();
        assert_eq!(pos.positions(), vec![Flat, Long, Flat, Flat, Flat, Long]);
    }

    #[test]
    fn rsi_thresholds_validated() {
        let rsi = rsi_series(&[Some(50.0)]);
        assert!(rsi_threshold(&rsi, 70.0, 30.0).unwrap_err().is_invalid_parameter());
        assert!(rsi_threshold(&rsi, 50.0, 50.0).unwrap_err().is_invalid_parameter());
        assert!(rsi_threshold(&rsi, -1.0, 50.0).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn bollinger_enters_below_lower_exits_above_middle() {
        // window 3, k = 1: a sharp dip below the band, then a recovery.
        let closes = [10.0, 10.0, 10.0, 7.0, 8.0, 9.5, 11.0, 11.0];
        let series = make_series(&closes);
        let bands = calculate_bollinger(&series, 3, 1.0).unwrap();
        let pos = bollinger_mean_reversion(&series, &bands).unwrap();

        // bar 3: middle 9, sd ~1.414, lower ~7.59 → 7 < lower → enter
        assert_eq!(pos.get(2), Some(Flat));
        assert_eq!(pos.get(3), Some(Long));
        // bar 4: middle 8.33, close 8 → hold
        assert_eq!(pos.get(4), Some(Long));
        // bar 5: middle 8.17, close 9.5 > middle → exit
        assert_eq!(pos.get(5), Some(Flat));
    }

    #[test]
    fn bollinger_first_defined_bar_below_band_does_not_enter() {
        // window 3, k = 0.5: bar 2 is the first defined bar and already
        // below its lower band; bar 3 is still below.
        let closes = [10.0, 10.0, 8.0, 7.0, 9.0];
        let series = make_series(&closes);
        let bands = calculate_bollinger(&series, 3, 0.5).unwrap();
        assert!(closes[2] < bands.lower.get(2).unwrap());
        assert!(closes[3] < bands.lower.get(3).unwrap());

        let pos = bollinger_mean_reversion(&series, &bands).unwrap();
        assert_eq!(pos.get(2), Some(Flat));
        assert_eq!(pos.get(3), Some(Flat));
    }

    #[test]
    fn donchian_breakout_entry_and_exit() {
        let closes = [10.0, 10.2, 10.1, 11.5, 11.8, 9.0, 9.2];
        let series = make_series(&closes);
        let channel = calculate_donchian(&series, 3, 2).unwrap();
        let pos = donchian_breakout(&series, &channel).unwrap();

        // bar 3: prior highs max 10.7 → 11.5 breaks out
        assert_eq!(pos.positions()[..3], [Flat, Flat, Flat]);
        assert_eq!(pos.get(3), Some(Long));
        assert_eq!(pos.get(4), Some(Long));
        // bar 5: prior 2 lows min 11.0 → 9.0 exits
        assert_eq!(pos.get(5), Some(Flat));
        assert_eq!(pos.get(6), Some(Flat));
    }

    #[test]
    fn positions_are_causal() {
        let closes = [10.0, 11.0, 12.0, 11.0, 13.0, 9.0, 8.0, 12.0];
        let full = make_series(&closes);
        let full_pos = sma_crossover(
            &calculate_sma(&full, 2).unwrap(),
            &calculate_sma(&full, 3).unwrap(),
        )
        .unwrap();

        for cut in 3..closes.len() {
            let prefix = make_series(&closes[..cut]);
            let prefix_pos = sma_crossover(
                &calculate_sma(&prefix, 2).unwrap(),
                &calculate_sma(&prefix, 3).unwrap(),
            )
            .unwrap();
            assert_eq!(prefix_pos.positions(), full_pos.positions()[..cut]);
        }
    }
}
