//! Grid search over strategy parameters.
//!
//! Every point of the Cartesian product of a [`ParameterGrid`] is an
//! independent evaluation of the full pipeline. Evaluations run on a rayon
//! pool and are gathered by combination index, so the returned order is the
//! grid's row-major enumeration order regardless of scheduling.
//!
//! Combinations that fail parameter validation are skipped and reported.
//! A data-integrity failure aborts the whole search.

use std::cmp::Ordering;
use std::sync::atomic::{self, AtomicBool};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::error::QuantboardError;
use crate::domain::metrics::{MetricKind, MetricsConfig, MetricsReport};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::pipeline::evaluate;
use crate::domain::strategy::{Params, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParameterGrid {
    axes: Vec<GridAxis>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an axis. Axis order is the enumeration order.
    pub fn axis(mut self, name: &str, values: Vec<f64>) -> Result<Self, QuantboardError> {
        if values.is_empty() {
            return Err(QuantboardError::invalid_parameter(name, "grid axis has no values"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(QuantboardError::invalid_parameter(name, "grid values must be finite"));
        }
        if self.axes.iter().any(|a| a.name == name) {
            return Err(QuantboardError::invalid_parameter(name, "duplicate grid axis"));
        }
        self.axes.push(GridAxis {
            name: name.to_string(),
            values,
        });
        Ok(self)
    }

    /// Parses `name=v1,v2,...` or `name=start:end[:step]` (inclusive).
    pub fn parse_axis(self, spec: &str) -> Result<Self, QuantboardError> {
        let (name, values) = spec
            .split_once('=')
            .ok_or_else(|| QuantboardError::invalid_parameter(spec, "expected name=values"))?;
        let name = name.trim();
        let values = values.trim();

        let parsed = if values.contains(':') {
            parse_range(name, values)?
        } else {
            values
                .split(',')
                .map(|v| {
                    v.trim().parse::<f64>().map_err(|_| {
                        QuantboardError::invalid_parameter(name, format!("'{v}' is not a number"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        self.axis(name, parsed)
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn axis_values(&self, name: &str) -> Option<&[f64]> {
        self.axes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.values.as_slice())
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            0
        } else {
            self.axes.iter().map(|a| a.values.len()).product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major: the last axis varies fastest.
    pub fn combination(&self, index: usize) -> Params {
        let mut params = Params::new();
        let mut stride = self.len();
        let mut rest = index;
        for axis in &self.axes {
            stride /= axis.values.len();
            let pos = rest / stride;
            rest %= stride;
            params.set(&axis.name, axis.values[pos]);
        }
        params
    }

    pub fn combinations(&self) -> Vec<Params> {
        (0..self.len()).map(|i| self.combination(i)).collect()
    }
}

fn parse_range(name: &str, spec: &str) -> Result<Vec<f64>, QuantboardError> {
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    let number = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| QuantboardError::invalid_parameter(name, format!("'{s}' is not a number")))
    };
    let (start, end, step) = match parts.as_slice() {
        [start, end] => (number(start)?, number(end)?, 1.0),
        [start, end, step] => (number(start)?, number(end)?, number(step)?),
        _ => {
            return Err(QuantboardError::invalid_parameter(
                name,
                "range must be start:end or start:end:step",
            ));
        }
    };
    if step <= 0.0 || end < start {
        return Err(QuantboardError::invalid_parameter(
            name,
            format!("empty range {start}:{end}:{step}"),
        ));
    }
    let count = ((end - start) / step + 1e-9).floor() as usize + 1;
    Ok((0..count).map(|i| start + step * i as f64).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridResult {
    pub index: usize,
    #[serde(flatten)]
    pub params: Params,
    #[serde(flatten)]
    pub metrics: MetricsReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCombination {
    pub index: usize,
    pub params: Params,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSearchOutcome {
    pub results: Vec<GridResult>,
    pub skipped: Vec<SkippedCombination>,
    pub cancelled: usize,
}

enum Outcome {
    Done(GridResult),
    Skipped(SkippedCombination),
    Cancelled,
    Failed(QuantboardError),
}

/// Grid search settings.
#[derive(Debug, Clone, Default)]
pub struct GridSearch<'a> {
    pub metrics: MetricsConfig,
    /// Worker threads; 0 uses rayon's default.
    pub threads: usize,
    /// Checked before each combination.
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> GridSearch<'a> {
    pub fn new(metrics: MetricsConfig) -> Self {
        Self {
            metrics,
            threads: 0,
            cancel: None,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn run<F>(
        &self,
        series: &PriceSeries,
        grid: &ParameterGrid,
        build: F,
    ) -> Result<GridSearchOutcome, QuantboardError>
    where
        F: Fn(&Params) -> Result<Strategy, QuantboardError> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| QuantboardError::invalid_parameter("threads", e.to_string()))?;

        let outcomes: Vec<Outcome> = pool.install(|| {
            (0..grid.len())
                .into_par_iter()
                .map(|index| self.evaluate_one(series, grid, &build, index))
                .collect()
        });

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        let mut cancelled = 0;
        for outcome in outcomes {
            match outcome {
                Outcome::Done(result) => results.push(result),
                Outcome::Skipped(skip) => skipped.push(skip),
                Outcome::Cancelled => cancelled += 1,
                Outcome::Failed(err) => return Err(err),
            }
        }

        if cancelled > 0 {
            warn!(cancelled, completed = results.len(), "grid search cancelled");
        }
        info!(
            combinations = grid.len(),
            evaluated = results.len(),
            skipped = skipped.len(),
            "grid search finished"
        );

        Ok(GridSearchOutcome {
            results,
            skipped,
            cancelled,
        })
    }

    fn evaluate_one<F>(&self, series: &PriceSeries, grid: &ParameterGrid, build: &F, index: usize) -> Outcome
    where
        F: Fn(&Params) -> Result<Strategy, QuantboardError>,
    {
        if self.cancel.is_some_and(|flag| flag.load(atomic::Ordering::Relaxed)) {
            return Outcome::Cancelled;
        }

        let params = grid.combination(index);
        let attempt = build(&params).and_then(|strategy| {
            let lookback = strategy.lookback();
            if lookback > series.len() {
                return Err(QuantboardError::invalid_parameter(
                    "lookback",
                    format!("{lookback} bars needed, series has {}", series.len()),
                ));
            }
            evaluate(series, &strategy, &self.metrics)
        });

        match attempt {
            Ok(evaluation) => Outcome::Done(GridResult {
                index,
                params,
                metrics: evaluation.metrics,
            }),
            Err(err) if err.is_invalid_parameter() => {
                warn!(%params, reason = %err, "skipping combination");
                Outcome::Skipped(SkippedCombination {
                    index,
                    params,
                    reason: err.to_string(),
                })
            }
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// Sorts by `metric`; undefined values always sort last.
pub fn sort_by_metric(results: &mut [GridResult], metric: MetricKind, descending: bool) {
    results.sort_by(|a, b| {
        let primary = match (metric.value(&a.metrics), metric.value(&b.metrics)) {
            (Some(x), Some(y)) if descending => y.total_cmp(&x),
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        primary.then(a.index.cmp(&b.index))
    });
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub row_axis: String,
    pub col_axis: String,
    pub metric: MetricKind,
    pub rows: Vec<f64>,
    pub cols: Vec<f64>,
    /// `cells[r][c]`; `None` for skipped or undefined cells.
    pub cells: Vec<Vec<Option<f64>>>,
}

/// Two-axis view of a search. With more than two axes each cell holds the
/// best value over the remaining axes.
pub fn heatmap(
    grid: &ParameterGrid,
    results: &[GridResult],
    row_axis: &str,
    col_axis: &str,
    metric: MetricKind,
) -> Result<Heatmap, QuantboardError> {
    let rows = grid
        .axis_values(row_axis)
        .ok_or_else(|| QuantboardError::invalid_parameter(row_axis, "not a grid axis"))?
        .to_vec();
    let cols = grid
        .axis_values(col_axis)
        .ok_or_else(|| QuantboardError::invalid_parameter(col_axis, "not a grid axis"))?
        .to_vec();
    if row_axis == col_axis {
        return Err(QuantboardError::invalid_parameter(
            col_axis,
            "heatmap axes must differ",
        ));
    }

    let mut cells = vec![vec![None; cols.len()]; rows.len()];
    for result in results {
        let (Some(r), Some(c)) = (result.params.get(row_axis), result.params.get(col_axis)) else {
            continue;
        };
        let (Some(ri), Some(ci)) = (
            rows.iter().position(|&v| v == r),
            cols.iter().position(|&v| v == c),
        ) else {
            continue;
        };
        if let Some(value) = metric.value(&result.metrics) {
            let cell: &mut Option<f64> = &mut cells[ri][ci];
            *cell = Some(cell.map_or(value, |existing| existing.max(value)));
        }
    }

    Ok(Heatmap {
        row_axis: row_axis.to_string(),
        col_axis: col_axis.to_string(),
        metric,
        rows,
        cols,
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use crate::domain::strategy::StrategyKind;
    use chrono::NaiveDate;

    fn make_series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 8.0 + i as f64 * 0.1;
                PriceBar {
                    timestamp: (start + chrono::Duration::days(i as i64))
                        .and_hms_opt(0, 0, 0)
                        .unwrap(),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1.0,
                }
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    fn sma_builder(params: &Params) -> Result<Strategy, QuantboardError> {
        StrategyKind::SmaCrossover.build(params)
    }

    #[test]
    fn grid_enumerates_row_major() {
        let grid = ParameterGrid::new()
            .axis("fast", vec![5.0, 10.0])
            .unwrap()
            .axis("slow", vec![20.0, 30.0])
            .unwrap();
        let combos: Vec<String> = grid.combinations().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            combos,
            vec![
                "fast=5, slow=20",
                "fast=5, slow=30",
                "fast=10, slow=20",
                "fast=10, slow=30"
            ]
        );
    }

    #[test]
    fn grid_rejects_bad_axes() {
        assert!(ParameterGrid::new().axis("fast", vec![]).is_err());
        assert!(
            ParameterGrid::new()
                .axis("fast", vec![1.0])
                .unwrap()
                .axis("fast", vec![2.0])
                .is_err()
        );
        assert_eq!(ParameterGrid::new().len(), 0);
    }

    #[test]
    fn parse_axis_list_and_range() {
        let grid = ParameterGrid::new()
            .parse_axis("fast=5,10,15")
            .unwrap()
            .parse_axis("slow=20:40:10")
            .unwrap()
            .parse_axis("k=1.5:2.5:0.5")
            .unwrap();
        assert_eq!(grid.axis_values("fast").unwrap(), &[5.0, 10.0, 15.0]);
        assert_eq!(grid.axis_values("slow").unwrap(), &[20.0, 30.0, 40.0]);
        assert_eq!(grid.axis_values("k").unwrap(), &[1.5, 2.0, 2.5]);
        assert_eq!(grid.len(), 27);

        assert!(ParameterGrid::new().parse_axis("fast").is_err());
        assert!(ParameterGrid::new().parse_axis("fast=10:5").is_err());
        assert!(ParameterGrid::new().parse_axis("fast=a,b").is_err());
    }

    #[test]
    fn search_returns_results_in_grid_order() {
        let series = make_series(80);
        let grid = ParameterGrid::new()
            .axis("fast", vec![5.0, 10.0])
            .unwrap()
            .axis("slow", vec![20.0, 30.0])
            .unwrap();

        let outcome = GridSearch::new(MetricsConfig::default())
            .with_threads(4)
            .run(&series, &grid, sma_builder)
            .unwrap();

        assert_eq!(outcome.results.len(), 4);
        assert!(outcome.skipped.is_empty());
        let indices: Vec<usize> = outcome.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(outcome.results[2].params.get("fast"), Some(10.0));
        assert_eq!(outcome.results[2].params.get("slow"), Some(20.0));
    }

    #[test]
    fn invalid_combinations_are_skipped() {
        let series = make_series(80);
        let grid = ParameterGrid::new()
            .axis("fast", vec![25.0])
            .unwrap()
            .axis("slow", vec![20.0])
            .unwrap();

        let outcome = GridSearch::new(MetricsConfig::default())
            .run(&series, &grid, sma_builder)
            .unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].reason.contains("must be less than slow"));
    }

    #[test]
    fn lookback_longer_than_series_is_skipped() {
        let series = make_series(25);
        let grid = ParameterGrid::new()
            .axis("fast", vec![5.0])
            .unwrap()
            .axis("slow", vec![20.0, 30.0])
            .unwrap();

        let outcome = GridSearch::new(MetricsConfig::default())
            .run(&series, &grid, sma_builder)
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].index, 1);
    }

    #[test]
    fn data_integrity_failure_aborts() {
        let series = make_series(40);
        let grid = ParameterGrid::new().axis("fast", vec![5.0, 10.0]).unwrap();
        let err = GridSearch::new(MetricsConfig::default())
            .run(&series, &grid, |_| Err(QuantboardError::data_integrity("bad input")))
            .unwrap_err();
        assert!(err.is_data_integrity());
    }

    #[test]
    fn cancelled_search_keeps_nothing_half_done() {
        let series = make_series(80);
        let grid = ParameterGrid::new()
            .axis("fast", vec![5.0, 10.0])
            .unwrap()
            .axis("slow", vec![20.0, 30.0])
            .unwrap();
        let flag = AtomicBool::new(true);

        let outcome = GridSearch::new(MetricsConfig::default())
            .with_cancel(&flag)
            .run(&series, &grid, sma_builder)
            .unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.cancelled, 4);
    }

    #[test]
    fn sort_by_metric_puts_undefined_last() {
        let series = make_series(80);
        let grid = ParameterGrid::new()
            .axis("fast", vec![3.0, 5.0, 8.0])
            .unwrap()
            .axis("slow", vec![13.0, 21.0])
            .unwrap();
        let mut results = GridSearch::new(MetricsConfig::default())
            .run(&series, &grid, sma_builder)
            .unwrap()
            .results;
        results[0].metrics.sharpe = None;

        sort_by_metric(&mut results, MetricKind::Sharpe, true);
        let sharpes: Vec<Option<f64>> = results.iter().map(|r| r.metrics.sharpe).collect();
        assert_eq!(sharpes.last(), Some(&None));
        for w in sharpes.windows(2) {
            if let (Some(a), Some(b)) = (w[0], w[1]) {
                assert!(a >= b);
            }
        }
    }

    #[test]
    fn heatmap_marks_skipped_cells() {
        let series = make_series(80);
        let grid = ParameterGrid::new()
            .axis("fast", vec![5.0, 25.0])
            .unwrap()
            .axis("slow", vec![20.0, 30.0])
            .unwrap();
        let outcome = GridSearch::new(MetricsConfig::default())
            .run(&series, &grid, sma_builder)
            .unwrap();

        let map = heatmap(&grid, &outcome.results, "fast", "slow", MetricKind::TotalReturn).unwrap();
        assert_eq!(map.rows, vec![5.0, 25.0]);
        assert_eq!(map.cols, vec![20.0, 30.0]);
        assert!(map.cells[0][0].is_some());
        assert!(map.cells[0][1].is_some());
        assert!(map.cells[1][0].is_none());
        assert!(map.cells[1][1].is_some());

        assert!(heatmap(&grid, &outcome.results, "fast", "window", MetricKind::Cagr).is_err());
    }

    #[test]
    fn grid_result_serializes_flat() {
        let series = make_series(40);
        let grid = ParameterGrid::new()
            .axis("fast", vec![5.0])
            .unwrap()
            .axis("slow", vec![20.0])
            .unwrap();
        let outcome = GridSearch::new(MetricsConfig::default())
            .run(&series, &grid, sma_builder)
            .unwrap();
        let json = serde_json::to_value(&outcome.results[0]).unwrap();
        assert_eq!(json["fast"], 5.0);
        assert_eq!(json["slow"], 20.0);
        assert!(json.get("total_return").is_some());
        assert!(json.get("max_drawdown").is_some());
    }
}
