//! Vectorised long/flat backtest.
//!
//! Execution model: a position decided at bar `i` earns the close-to-close
//! return from bar `i` to bar `i+1`:
//!
//! ```text
//! r[i+1] = position[i] * (close[i+1] / close[i] - 1)
//! equity[0] = 1.0, equity[i+1] = equity[i] * (1 + r[i+1])
//! ```
//!
//! No commissions, slippage, financing or partial fills are modelled.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::error::QuantboardError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::position::{Position, PositionSeries};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Return realised over the bar ending at `timestamp`, earned by `position`
/// held from the previous bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodReturn {
    pub timestamp: NaiveDateTime,
    pub position: Position,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_ts: NaiveDateTime,
    pub exit_ts: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub return_pct: f64,
    pub bars_held: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub period_returns: Vec<PeriodReturn>,
}

impl BacktestResult {
    pub fn initial_equity(&self) -> f64 {
        self.equity_curve.first().map(|p| p.equity).unwrap_or(1.0)
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().map(|p| p.equity).unwrap_or(1.0)
    }

    pub fn returns(&self) -> Vec<f64> {
        self.period_returns.iter().map(|r| r.value).collect()
    }
}

struct OpenTrade {
    entry_index: usize,
    growth: f64,
}

pub fn run_backtest(
    series: &PriceSeries,
    positions: &PositionSeries,
) -> Result<BacktestResult, QuantboardError> {
    check_alignment(series, positions)?;

    let bars = series.bars();
    let mut equity = 1.0;
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut period_returns = Vec::with_capacity(bars.len().saturating_sub(1));
    let mut trades = Vec::new();
    let mut open: Option<OpenTrade> = None;

    equity_curve.push(EquityPoint {
        timestamp: bars[0].timestamp,
        equity,
    });

    for i in 0..bars.len() {
        let position = positions.points[i].position;

        // Close before (re)opening so a decision at bar i is acted on at bar i.
        if !position.is_long() {
            if let Some(trade) = open.take() {
                trades.push(close_trade(series, trade, i));
            }
        } else if open.is_none() {
            open = Some(OpenTrade {
                entry_index: i,
                growth: 1.0,
            });
        }

        if i + 1 < bars.len() {
            let change = bars[i + 1].close / bars[i].close - 1.0;
            let value = position.weight() * change;
            equity *= 1.0 + value;
            if let Some(trade) = open.as_mut() {
                trade.growth *= 1.0 + value;
            }
            period_returns.push(PeriodReturn {
                timestamp: bars[i + 1].timestamp,
                position,
                value,
            });
            equity_curve.push(EquityPoint {
                timestamp: bars[i + 1].timestamp,
                equity,
            });
        }
    }

    // Force-close at the final bar; a position opened on the last bar never
    // earned a return and is not a trade.
    if let Some(trade) = open.take() {
        let last = bars.len() - 1;
        if trade.entry_index < last {
            trades.push(close_trade(series, trade, last));
        }
    }

    Ok(BacktestResult {
        equity_curve,
        trades,
        period_returns,
    })
}

fn close_trade(series: &PriceSeries, trade: OpenTrade, exit_index: usize) -> Trade {
    let bars = series.bars();
    let entry = &bars[trade.entry_index];
    let exit = &bars[exit_index];
    Trade {
        entry_ts: entry.timestamp,
        exit_ts: exit.timestamp,
        entry_price: entry.close,
        exit_price: exit.close,
        return_pct: trade.growth - 1.0,
        bars_held: exit_index - trade.entry_index,
    }
}

fn check_alignment(series: &PriceSeries, positions: &PositionSeries) -> Result<(), QuantboardError> {
    if series.len() != positions.len() {
        return Err(QuantboardError::data_integrity(format!(
            "position series has {} points, price series has {} bars",
            positions.len(),
            series.len()
        )));
    }
    for (i, (bar, point)) in series.bars().iter().zip(&positions.points).enumerate() {
        if bar.timestamp != point.timestamp {
            return Err(QuantboardError::data_integrity(format!(
                "position timestamp {} does not match bar {} at row {i}",
                point.timestamp, bar.timestamp
            )));
        }
    }
    Ok(())
}
