//! CLI definition and dispatch.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::price_cache::PriceCache;
use crate::domain::config_validation::{validate_config, Settings};
use crate::domain::error::QuantboardError;
use crate::domain::metrics::{MetricKind, MetricsConfig, MetricsReport};
use crate::domain::ohlcv::Interval;
use crate::domain::optimizer::{
    heatmap, sort_by_metric, GridResult, GridSearch, GridSearchOutcome, Heatmap, ParameterGrid,
};
use crate::domain::pipeline::{evaluate, Evaluation};
use crate::domain::strategy::{Params, StrategyKind};
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "quantboard",
    about = "Single-instrument strategy backtester and parameter optimizer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one backtest, or a grid search with --optimize
    Backtest(BacktestArgs),
    /// List tickers with price files for an interval
    ListSymbols {
        #[arg(long)]
        interval: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show strategies and their default parameters
    Strategies,
}

#[derive(Args, Debug, Default)]
pub struct BacktestArgs {
    #[arg(long)]
    pub ticker: String,
    /// First date, YYYY-MM-DD (inclusive)
    #[arg(long)]
    pub start: NaiveDate,
    /// Last date, YYYY-MM-DD (inclusive)
    #[arg(long)]
    pub end: NaiveDate,
    /// 1d, 1wk or 1mo
    #[arg(long)]
    pub interval: Option<String>,
    /// sma-crossover, rsi, bollinger or donchian
    #[arg(long)]
    pub strategy: String,
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,
    #[arg(long)]
    pub optimize: bool,
    /// Grid axis, e.g. fast=5,10,20 or slow=20:60:10
    #[arg(long = "grid", value_name = "NAME=VALUES")]
    pub grid: Vec<String>,
    /// Ranking metric for --optimize
    #[arg(long)]
    pub metric: Option<String>,
    /// Rows shown for --optimize
    #[arg(long)]
    pub top: Option<usize>,
    /// Worker threads for --optimize (0 = all cores)
    #[arg(long)]
    pub threads: Option<usize>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[arg(long)]
    pub json: bool,
    #[arg(long)]
    pub equity_csv: Option<String>,
    #[arg(long)]
    pub trades_csv: Option<String>,
    #[arg(long)]
    pub signals_csv: Option<String>,
    #[arg(long)]
    pub grid_csv: Option<String>,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest(args) => run_backtest(&args),
        Command::ListSymbols {
            interval,
            data_dir,
            config,
        } => run_list_symbols(interval.as_deref(), data_dir, config.as_ref()),
        Command::Strategies => {
            print!("{}", format_strategies());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Reads and validates the INI file, or returns defaults without one.
pub fn load_settings(path: Option<&PathBuf>) -> Result<Settings, QuantboardError> {
    let adapter = match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)?
        }
        None => FileConfigAdapter::empty(),
    };
    validate_config(&adapter)
}

/// Applies command-line overrides on top of config settings.
pub fn resolve_settings(args: &BacktestArgs) -> Result<Settings, QuantboardError> {
    let mut settings = load_settings(args.config.as_ref())?;
    if let Some(dir) = &args.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(interval) = &args.interval {
        settings.interval = interval.parse()?;
    }
    if let Some(metric) = &args.metric {
        settings.metric = metric.parse()?;
    }
    if let Some(top) = args.top {
        if top == 0 {
            return Err(QuantboardError::invalid_parameter("top", "must be at least 1"));
        }
        settings.top = top;
    }
    if let Some(threads) = args.threads {
        settings.threads = threads;
    }
    Ok(settings)
}

/// Strategy defaults overridden by `overrides`, in default order.
pub fn merge_params(base: &Params, overrides: &Params) -> Params {
    let mut merged = base.clone();
    for (name, value) in overrides.iter() {
        merged.set(name, value);
    }
    merged
}

pub fn parse_grid<S: AsRef<str>>(specs: &[S]) -> Result<ParameterGrid, QuantboardError> {
    if specs.is_empty() {
        return Err(QuantboardError::invalid_parameter(
            "grid",
            "--optimize needs at least one --grid axis",
        ));
    }
    specs
        .iter()
        .try_fold(ParameterGrid::new(), |grid, spec| grid.parse_axis(spec.as_ref()))
}

/// What to run, independent of where prices come from.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
    pub kind: StrategyKind,
    pub params: Params,
}

impl RunRequest {
    fn check_dates(&self) -> Result<(), QuantboardError> {
        if self.start > self.end {
            return Err(QuantboardError::invalid_parameter(
                "start",
                format!("start {} is after end {}", self.start, self.end),
            ));
        }
        Ok(())
    }
}

pub fn run_single(
    data: &dyn DataPort,
    request: &RunRequest,
    config: &MetricsConfig,
) -> Result<Evaluation, QuantboardError> {
    request.check_dates()?;
    let strategy = request.kind.build(&request.params)?;
    let series = data.fetch_prices(&request.ticker, request.start, request.end, request.interval)?;
    info!(ticker = %request.ticker, bars = series.len(), %strategy, "running backtest");
    evaluate(&series, &strategy, config)
}

/// Grid search; `request.params` fixes every parameter not on a grid axis.
pub fn run_optimize(
    data: &dyn DataPort,
    request: &RunRequest,
    grid: &ParameterGrid,
    search: &GridSearch<'_>,
) -> Result<GridSearchOutcome, QuantboardError> {
    request.check_dates()?;
    for axis in grid.axes() {
        request.kind.check_param_name(&axis.name)?;
    }
    let series = data.fetch_prices(&request.ticker, request.start, request.end, request.interval)?;
    info!(
        ticker = %request.ticker,
        bars = series.len(),
        combinations = grid.len(),
        "running grid search"
    );
    let kind = request.kind;
    let base = request.params.clone();
    search.run(&series, grid, move |combo| kind.build(&merge_params(&base, combo)))
}

pub fn run_backtest(args: &BacktestArgs) -> Result<(), QuantboardError> {
    let settings = resolve_settings(args)?;
    let kind: StrategyKind = args.strategy.parse()?;
    let overrides = Params::parse_assignments(&args.params)?;
    let request = RunRequest {
        ticker: args.ticker.clone(),
        start: args.start,
        end: args.end,
        interval: settings.interval,
        kind,
        params: merge_params(&kind.default_params(), &overrides),
    };

    let data = PriceCache::new(
        CsvAdapter::new(settings.data_dir.clone()),
        Duration::from_secs(settings.cache_ttl_secs),
    );
    let metrics_config = settings.metrics_config(settings.interval);
    let reports = CsvReportAdapter::new();

    if args.optimize {
        let grid = parse_grid(&args.grid)?;
        let search = GridSearch::new(metrics_config).with_threads(settings.threads);
        let mut outcome = run_optimize(&data, &request, &grid, &search)?;

        if let Some(path) = &args.grid_csv {
            reports.write_grid(&outcome.results, path)?;
        }

        let map = if grid.axes().len() == 2 {
            let axes = grid.axes();
            Some(heatmap(
                &grid,
                &outcome.results,
                &axes[0].name,
                &axes[1].name,
                settings.metric,
            )?)
        } else {
            None
        };

        sort_by_metric(&mut outcome.results, settings.metric, true);

        if args.json {
            let body = json!({
                "ticker": request.ticker,
                "interval": request.interval.as_str(),
                "strategy": kind.name(),
                "metric": settings.metric,
                "combinations": grid.len(),
                "results": outcome.results,
                "skipped": outcome.skipped,
                "cancelled": outcome.cancelled,
                "heatmap": map,
            });
            println!("{}", to_json(&body)?);
        } else {
            print!(
                "{}",
                format_ranking(&outcome.results, settings.metric, settings.top)
            );
            println!(
                "\n{} combinations, {} evaluated, {} skipped",
                grid.len(),
                outcome.results.len(),
                outcome.skipped.len()
            );
            if let Some(map) = &map {
                print!("\n{}", format_heatmap(map));
            }
        }
        return Ok(());
    }

    if !args.grid.is_empty() {
        return Err(QuantboardError::invalid_parameter(
            "grid",
            "--grid requires --optimize",
        ));
    }

    let evaluation = run_single(&data, &request, &metrics_config)?;

    if let Some(path) = &args.equity_csv {
        reports.write_equity_curve(&evaluation.backtest, path)?;
    }
    if let Some(path) = &args.trades_csv {
        reports.write_trades(&evaluation.backtest, path)?;
    }
    if let Some(path) = &args.signals_csv {
        reports.write_signals(&evaluation.signals, path)?;
    }

    if args.json {
        let body = json!({
            "ticker": request.ticker,
            "interval": request.interval.as_str(),
            "strategy": kind.name(),
            "params": request.params,
            "bars": evaluation.backtest.equity_curve.len(),
            "metrics": evaluation.metrics,
            "trades": evaluation.backtest.trades,
        });
        println!("{}", to_json(&body)?);
    } else {
        println!(
            "{} {} {} to {}  {}({})",
            request.ticker,
            request.interval,
            request.start,
            request.end,
            kind,
            request.params
        );
        print!("{}", format_metrics(&evaluation.metrics));
    }
    Ok(())
}

pub fn run_list_symbols(
    interval: Option<&str>,
    data_dir: Option<PathBuf>,
    config_path: Option<&PathBuf>,
) -> Result<(), QuantboardError> {
    let settings = load_settings(config_path)?;
    let interval = match interval {
        Some(raw) => raw.parse()?,
        None => settings.interval,
    };
    let adapter = CsvAdapter::new(data_dir.unwrap_or(settings.data_dir));
    let symbols = adapter.list_symbols(interval)?;
    if symbols.is_empty() {
        eprintln!("No symbols found for interval {interval}");
    }
    for symbol in symbols {
        println!("{symbol}");
    }
    Ok(())
}

fn to_json(value: &serde_json::Value) -> Result<String, QuantboardError> {
    serde_json::to_string_pretty(value).map_err(|e| QuantboardError::Report {
        reason: format!("failed to encode JSON: {e}"),
    })
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn metric_cell(metric: MetricKind, value: Option<f64>) -> String {
    match metric {
        MetricKind::Sharpe | MetricKind::Sortino => ratio(value),
        MetricKind::NTrades => value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.0}")),
        _ => pct(value),
    }
}

pub fn format_metrics(m: &MetricsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total Return:     {}", pct(Some(m.total_return)));
    let _ = writeln!(out, "CAGR:             {}", pct(m.cagr));
    let _ = writeln!(out, "Sharpe Ratio:     {}", ratio(m.sharpe));
    let _ = writeln!(out, "Sortino Ratio:    {}", ratio(m.sortino));
    let _ = writeln!(out, "Max Drawdown:     {}", pct(Some(m.max_drawdown)));
    let _ = writeln!(out, "Total Trades:     {}", m.n_trades);
    let _ = writeln!(out, "Win Rate:         {}", pct(m.win_rate));
    let _ = writeln!(out, "Avg Trade:        {}", pct(m.avg_trade_return));
    let _ = writeln!(out, "Exposure:         {}", pct(Some(m.exposure)));
    out
}

/// Ranked table of the first `top` results, which must already be sorted.
pub fn format_ranking(results: &[GridResult], metric: MetricKind, top: usize) -> String {
    let mut out = String::new();
    if results.is_empty() {
        out.push_str("No valid parameter combinations\n");
        return out;
    }
    let _ = writeln!(
        out,
        "{:>4}  {:<28} {:>12} {:>10} {:>8} {:>10} {:>7}",
        "rank",
        "params",
        metric.name(),
        "return",
        "sharpe",
        "max_dd",
        "trades"
    );
    for (rank, result) in results.iter().take(top).enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:<28} {:>12} {:>10} {:>8} {:>10} {:>7}",
            rank + 1,
            result.params.to_string(),
            metric_cell(metric, metric.value(&result.metrics)),
            pct(Some(result.metrics.total_return)),
            ratio(result.metrics.sharpe),
            pct(Some(result.metrics.max_drawdown)),
            result.metrics.n_trades
        );
    }
    out
}

pub fn format_heatmap(map: &Heatmap) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} by {} (rows) x {} (columns)",
        map.metric, map.row_axis, map.col_axis
    );
    let _ = write!(out, "{:>10}", "");
    for col in &map.cols {
        let _ = write!(out, " {col:>10}");
    }
    out.push('\n');
    for (row, cells) in map.rows.iter().zip(&map.cells) {
        let _ = write!(out, "{row:>10}");
        for cell in cells {
            let _ = write!(out, " {:>10}", metric_cell(map.metric, *cell));
        }
        out.push('\n');
    }
    out
}

pub fn format_strategies() -> String {
    let mut out = String::new();
    for kind in StrategyKind::ALL {
        let _ = writeln!(out, "{:<16} {}", kind.name(), kind.default_params());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_backtest_flags() {
        let cli = Cli::try_parse_from([
            "quantboard",
            "backtest",
            "--ticker",
            "SPY",
            "--start",
            "2020-01-01",
            "--end",
            "2020-12-31",
            "--strategy",
            "sma-crossover",
            "--param",
            "fast=5",
            "--param",
            "slow=20",
            "--optimize",
            "--grid",
            "fast=5,10",
            "--json",
        ])
        .unwrap();
        let Command::Backtest(args) = cli.command else {
            panic!("expected backtest");
        };
        assert_eq!(args.ticker, "SPY");
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(args.params, vec!["fast=5", "slow=20"]);
        assert!(args.optimize);
        assert_eq!(args.grid, vec!["fast=5,10"]);
        assert!(args.json);
    }

    #[test]
    fn cli_rejects_bad_date() {
        assert!(
            Cli::try_parse_from([
                "quantboard",
                "backtest",
                "--ticker",
                "SPY",
                "--start",
                "2020/01/01",
                "--end",
                "2020-12-31",
                "--strategy",
                "rsi",
            ])
            .is_err()
        );
    }

    #[test]
    fn merge_keeps_default_order() {
        let base = StrategyKind::SmaCrossover.default_params();
        let merged = merge_params(&base, &Params::new().with("slow", 30.0));
        assert_eq!(merged.to_string(), "fast=20, slow=30");
    }

    #[test]
    fn parse_grid_requires_an_axis() {
        let empty: [&str; 0] = [];
        assert!(parse_grid(&empty).unwrap_err().is_invalid_parameter());
        assert_eq!(parse_grid(&["fast=5,10", "slow=20,30"]).unwrap().len(), 4);
    }

    #[test]
    fn undefined_metrics_render_as_na() {
        let report = MetricsReport {
            total_return: 0.0,
            cagr: None,
            sharpe: None,
            sortino: None,
            max_drawdown: 0.0,
            n_trades: 0,
            win_rate: None,
            avg_trade_return: None,
            exposure: 0.0,
        };
        let text = format_metrics(&report);
        assert!(text.contains("Sharpe Ratio:     n/a"));
        assert!(text.contains("Win Rate:         n/a"));
        assert!(text.contains("Total Return:     0.00%"));
    }

    #[test]
    fn heatmap_table_marks_empty_cells() {
        let map = Heatmap {
            row_axis: "fast".into(),
            col_axis: "slow".into(),
            metric: MetricKind::Sharpe,
            rows: vec![5.0, 25.0],
            cols: vec![20.0],
            cells: vec![vec![Some(1.234)], vec![None]],
        };
        let text = format_heatmap(&map);
        assert!(text.contains("1.23"));
        assert!(text.contains("n/a"));
    }
}
