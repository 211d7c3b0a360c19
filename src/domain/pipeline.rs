//! The single-run chain: indicators → signals → backtest → metrics.

use tracing::debug;

use crate::domain::backtest::{run_backtest, BacktestResult};
use crate::domain::error::QuantboardError;
use crate::domain::metrics::{MetricsConfig, MetricsReport};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::strategy::{Strategy, StrategySignals};

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub signals: StrategySignals,
    pub backtest: BacktestResult,
    pub metrics: MetricsReport,
}

/// Fails with `InsufficientData` when the series is shorter than the
/// strategy's lookback instead of producing an all-flat run.
pub fn evaluate(
    series: &PriceSeries,
    strategy: &Strategy,
    config: &MetricsConfig,
) -> Result<Evaluation, QuantboardError> {
    strategy.validate()?;
    let minimum = strategy.lookback();
    if series.len() < minimum {
        return Err(QuantboardError::InsufficientData {
            bars: series.len(),
            minimum,
        });
    }

    let signals = strategy.generate(series)?;
    let backtest = run_backtest(series, &signals.positions)?;
    let metrics = MetricsReport::compute(&backtest, config);

    debug!(
        %strategy,
        bars = series.len(),
        trades = metrics.n_trades,
        total_return = metrics.total_return,
        "evaluated strategy"
    );

    Ok(Evaluation {
        signals,
        backtest,
        metrics,
    })
}
