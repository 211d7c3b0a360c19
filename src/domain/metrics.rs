//! Performance metrics and statistics.
//!
//! Metrics that cannot be computed from degenerate input (no periods, zero
//! variance, no trades) are `None` rather than NaN or infinity.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::backtest::{BacktestResult, EquityPoint};
use crate::domain::error::QuantboardError;
use crate::domain::ohlcv::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsConfig {
    pub periods_per_year: f64,
    /// Annual rate, converted to a per-period rate for Sharpe/Sortino.
    pub risk_free_rate: f64,
}

impl MetricsConfig {
    pub fn for_interval(interval: Interval) -> Self {
        Self {
            periods_per_year: interval.periods_per_year(),
            risk_free_rate: 0.0,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self::for_interval(Interval::Daily)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub total_return: f64,
    pub cagr: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub max_drawdown: f64,
    pub n_trades: usize,
    pub win_rate: Option<f64>,
    pub avg_trade_return: Option<f64>,
    pub exposure: f64,
}

impl MetricsReport {
    pub fn compute(result: &BacktestResult, config: &MetricsConfig) -> Self {
        let initial = result.initial_equity();
        let final_equity = result.final_equity();
        let ratio = final_equity / initial;
        let total_return = ratio - 1.0;

        let returns = result.returns();
        let n_periods = returns.len();
        let cagr = if n_periods > 0 {
            Some(ratio.powf(config.periods_per_year / n_periods as f64) - 1.0)
        } else {
            None
        };

        let period_rf = config.risk_free_rate / config.periods_per_year;
        let (sharpe, sortino) = compute_risk_adjusted(&returns, period_rf, config.periods_per_year);

        let n_trades = result.trades.len();
        let (win_rate, avg_trade_return) = if n_trades > 0 {
            let wins = result.trades.iter().filter(|t| t.return_pct > 0.0).count();
            let sum: f64 = result.trades.iter().map(|t| t.return_pct).sum();
            (
                Some(wins as f64 / n_trades as f64),
                Some(sum / n_trades as f64),
            )
        } else {
            (None, None)
        };

        let exposure = if n_periods > 0 {
            let held = result
                .period_returns
                .iter()
                .filter(|r| r.position.is_long())
                .count();
            held as f64 / n_periods as f64
        } else {
            0.0
        };

        MetricsReport {
            total_return,
            cagr,
            sharpe,
            sortino,
            max_drawdown: compute_max_drawdown(&result.equity_curve),
            n_trades,
            win_rate,
            avg_trade_return,
            exposure,
        }
    }
}

/// min over i of equity[i] / running_max - 1. Always <= 0.
pub fn compute_max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            max_dd = max_dd.min(point.equity / peak - 1.0);
        }
    }
    max_dd
}

fn compute_risk_adjusted(
    returns: &[f64],
    period_rf: f64,
    periods_per_year: f64,
) -> (Option<f64>, Option<f64>) {
    if returns.is_empty() {
        return (None, None);
    }

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - period_rf;
    let annualise = periods_per_year.sqrt();

    let sharpe = (stddev > 0.0).then(|| excess_return / stddev * annualise);

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();
    let sortino = (downside_stddev > 0.0).then(|| excess_return / downside_stddev * annualise);

    (sharpe, sortino)
}

/// Any orderable field of a [`MetricsReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    TotalReturn,
    Cagr,
    Sharpe,
    Sortino,
    MaxDrawdown,
    NTrades,
    WinRate,
    AvgTradeReturn,
    Exposure,
}

impl MetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::TotalReturn => "total_return",
            MetricKind::Cagr => "cagr",
            MetricKind::Sharpe => "sharpe",
            MetricKind::Sortino => "sortino",
            MetricKind::MaxDrawdown => "max_drawdown",
            MetricKind::NTrades => "n_trades",
            MetricKind::WinRate => "win_rate",
            MetricKind::AvgTradeReturn => "avg_trade_return",
            MetricKind::Exposure => "exposure",
        }
    }

    pub fn value(&self, report: &MetricsReport) -> Option<f64> {
        match self {
            MetricKind::TotalReturn => Some(report.total_return),
            MetricKind::Cagr => report.cagr,
            MetricKind::Sharpe => report.sharpe,
            MetricKind::Sortino => report.sortino,
            MetricKind::MaxDrawdown => Some(report.max_drawdown),
            MetricKind::NTrades => Some(report.n_trades as f64),
            MetricKind::WinRate => report.win_rate,
            MetricKind::AvgTradeReturn => report.avg_trade_return,
            MetricKind::Exposure => Some(report.exposure),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = QuantboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "total_return" | "return" => Ok(MetricKind::TotalReturn),
            "cagr" => Ok(MetricKind::Cagr),
            "sharpe" => Ok(MetricKind::Sharpe),
            "sortino" => Ok(MetricKind::Sortino),
            "max_drawdown" | "maxdd" | "drawdown" => Ok(MetricKind::MaxDrawdown),
            "n_trades" | "trades" => Ok(MetricKind::NTrades),
            "win_rate" => Ok(MetricKind::WinRate),
            "avg_trade_return" => Ok(MetricKind::AvgTradeReturn),
            "exposure" => Ok(MetricKind::Exposure),
            other => Err(QuantboardError::invalid_parameter(
                "metric",
                format!("unknown metric '{other}'"),
            )),
        }
    }
}
