//! Tabular result export port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::QuantboardError;
use crate::domain::optimizer::GridResult;
use crate::domain::strategy::StrategySignals;

/// Port for writing run artefacts.
pub trait ReportPort {
    fn write_equity_curve(&self, result: &BacktestResult, path: &str) -> Result<(), QuantboardError>;

    fn write_trades(&self, result: &BacktestResult, path: &str) -> Result<(), QuantboardError>;

    /// Positions plus every overlay series, one row per bar.
    fn write_signals(&self, signals: &StrategySignals, path: &str) -> Result<(), QuantboardError>;

    fn write_grid(&self, results: &[GridResult], path: &str) -> Result<(), QuantboardError>;
}
