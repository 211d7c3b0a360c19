//! CSV export adapter implementing ReportPort.
//!
//! Undefined values are written as empty cells.

use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::QuantboardError;
use crate::domain::metrics::MetricKind;
use crate::domain::optimizer::GridResult;
use crate::domain::strategy::StrategySignals;
use crate::ports::report_port::ReportPort;

const METRIC_COLUMNS: [MetricKind; 9] = [
    MetricKind::TotalReturn,
    MetricKind::Cagr,
    MetricKind::Sharpe,
    MetricKind::Sortino,
    MetricKind::MaxDrawdown,
    MetricKind::NTrades,
    MetricKind::WinRate,
    MetricKind::AvgTradeReturn,
    MetricKind::Exposure,
];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn writer(path: &str) -> Result<csv::Writer<std::fs::File>, QuantboardError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        csv::Writer::from_path(path).map_err(|e| report_error(path, e))
    }
}

fn report_error(path: &str, e: csv::Error) -> QuantboardError {
    QuantboardError::Report {
        reason: format!("failed to write {path}: {e}"),
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ReportPort for CsvReportAdapter {
    fn write_equity_curve(&self, result: &BacktestResult, path: &str) -> Result<(), QuantboardError> {
        let mut wtr = Self::writer(path)?;
        for point in &result.equity_curve {
            wtr.serialize(point).map_err(|e| report_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_trades(&self, result: &BacktestResult, path: &str) -> Result<(), QuantboardError> {
        let mut wtr = Self::writer(path)?;
        if result.trades.is_empty() {
            wtr.write_record([
                "entry_ts",
                "exit_ts",
                "entry_price",
                "exit_price",
                "return_pct",
                "bars_held",
            ])
            .map_err(|e| report_error(path, e))?;
        }
        for trade in &result.trades {
            wtr.serialize(trade).map_err(|e| report_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_signals(&self, signals: &StrategySignals, path: &str) -> Result<(), QuantboardError> {
        let mut wtr = Self::writer(path)?;

        let mut header = vec!["timestamp".to_string(), "position".to_string()];
        header.extend(signals.overlays.iter().map(|o| o.name.to_string()));
        wtr.write_record(&header).map_err(|e| report_error(path, e))?;

        for (i, point) in signals.positions.points.iter().enumerate() {
            let mut row = vec![
                point.timestamp.to_string(),
                point.position.weight().to_string(),
            ];
            row.extend(signals.overlays.iter().map(|o| cell(o.series.get(i))));
            wtr.write_record(&row).map_err(|e| report_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_grid(&self, results: &[GridResult], path: &str) -> Result<(), QuantboardError> {
        let mut wtr = Self::writer(path)?;

        let param_names: Vec<String> = results
            .first()
            .map(|r| r.params.iter().map(|(n, _)| n.to_string()).collect())
            .unwrap_or_default();

        let mut header = vec!["index".to_string()];
        header.extend(param_names.iter().cloned());
        header.extend(METRIC_COLUMNS.iter().map(|m| m.name().to_string()));
        wtr.write_record(&header).map_err(|e| report_error(path, e))?;

        for result in results {
            let mut row = vec![result.index.to_string()];
            row.extend(param_names.iter().map(|n| cell(result.params.get(n))));
            row.extend(METRIC_COLUMNS.iter().map(|m| cell(m.value(&result.metrics))));
            wtr.write_record(&row).map_err(|e| report_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }
}
