//! Configuration validation.
//!
//! Every key is range-checked before any run. Keys are optional; missing
//! keys fall back to the defaults in [`Settings::default`].

use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::error::QuantboardError;
use crate::domain::metrics::{MetricKind, MetricsConfig};
use crate::domain::ohlcv::Interval;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_TOP: usize = 10;

/// Resolved settings after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub interval: Interval,
    /// Overrides the interval's mapping when set.
    pub periods_per_year: Option<f64>,
    pub risk_free_rate: f64,
    pub threads: usize,
    pub metric: MetricKind,
    pub top: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            interval: Interval::Daily,
            periods_per_year: None,
            risk_free_rate: 0.0,
            threads: 0,
            metric: MetricKind::Sharpe,
            top: DEFAULT_TOP,
        }
    }
}

impl Settings {
    pub fn metrics_config(&self, interval: Interval) -> MetricsConfig {
        MetricsConfig {
            periods_per_year: self
                .periods_per_year
                .unwrap_or_else(|| interval.periods_per_year()),
            risk_free_rate: self.risk_free_rate,
        }
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<Settings, QuantboardError> {
    let defaults = Settings::default();

    let data_dir = match config.get_string("data", "dir") {
        Some(dir) if dir.trim().is_empty() => {
            return Err(invalid("data", "dir", "dir must not be empty"));
        }
        Some(dir) => PathBuf::from(dir.trim()),
        None => defaults.data_dir,
    };
    let cache_ttl_secs =
        parse_key::<u64>(config, "data", "cache_ttl_secs")?.unwrap_or(defaults.cache_ttl_secs);

    let interval = match config.get_string("backtest", "interval") {
        Some(raw) => raw
            .parse::<Interval>()
            .map_err(|_| invalid("backtest", "interval", "interval must be one of 1d, 1wk, 1mo"))?,
        None => defaults.interval,
    };

    let periods_per_year = parse_key::<f64>(config, "backtest", "periods_per_year")?;
    if let Some(ppy) = periods_per_year {
        if !ppy.is_finite() || ppy <= 0.0 {
            return Err(invalid(
                "backtest",
                "periods_per_year",
                "periods_per_year must be positive",
            ));
        }
    }

    let risk_free_rate =
        parse_key::<f64>(config, "backtest", "risk_free_rate")?.unwrap_or(defaults.risk_free_rate);
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let threads = parse_key::<usize>(config, "optimize", "threads")?.unwrap_or(defaults.threads);

    let metric = match config.get_string("optimize", "metric") {
        Some(raw) => raw
            .parse::<MetricKind>()
            .map_err(|_| invalid("optimize", "metric", &format!("unknown metric '{}'", raw.trim())))?,
        None => defaults.metric,
    };

    let top = parse_key::<usize>(config, "optimize", "top")?.unwrap_or(defaults.top);
    if top < 1 {
        return Err(invalid("optimize", "top", "top must be at least 1"));
    }

    Ok(Settings {
        data_dir,
        cache_ttl_secs,
        interval,
        periods_per_year,
        risk_free_rate,
        threads,
        metric,
        top,
    })
}

/// `None` when the key is absent; `ConfigInvalid` when it does not parse.
fn parse_key<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, QuantboardError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("'{}' is not a valid {key}", raw.trim()))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> QuantboardError {
    QuantboardError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(content: &str) -> String {
        match validate_config(&make_config(content)).unwrap_err() {
            QuantboardError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_yields_defaults() {
        let settings = validate_config(&make_config("")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn full_config_is_read() {
        let settings = validate_config(&make_config(
            r#"
[data]
dir = /srv/prices
cache_ttl_secs = 0

[backtest]
interval = 1wk
risk_free_rate = 0.02

[optimize]
threads = 4
metric = total_return
top = 3
"#,
        ))
        .unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/prices"));
        assert_eq!(settings.cache_ttl_secs, 0);
        assert_eq!(settings.interval, Interval::Weekly);
        assert_eq!(settings.risk_free_rate, 0.02);
        assert_eq!(settings.threads, 4);
        assert_eq!(settings.metric, MetricKind::TotalReturn);
        assert_eq!(settings.top, 3);
        assert_eq!(settings.metrics_config(settings.interval).periods_per_year, 52.0);
    }

    #[test]
    fn periods_per_year_overrides_interval() {
        let settings =
            validate_config(&make_config("[backtest]\nperiods_per_year = 365\n")).unwrap();
        assert_eq!(settings.metrics_config(Interval::Daily).periods_per_year, 365.0);
    }

    #[test]
    fn periods_per_year_must_be_positive() {
        assert_eq!(
            invalid_key("[backtest]\nperiods_per_year = 0\n"),
            "periods_per_year"
        );
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        assert_eq!(invalid_key("[backtest]\nrisk_free_rate = 1.5\n"), "risk_free_rate");
        assert_eq!(invalid_key("[backtest]\nrisk_free_rate = -0.05\n"), "risk_free_rate");
    }

    #[test]
    fn unknown_interval_fails() {
        assert_eq!(invalid_key("[backtest]\ninterval = 5m\n"), "interval");
    }

    #[test]
    fn non_numeric_values_fail() {
        assert_eq!(invalid_key("[optimize]\nthreads = many\n"), "threads");
        assert_eq!(invalid_key("[data]\ncache_ttl_secs = -1\n"), "cache_ttl_secs");
    }

    #[test]
    fn unknown_metric_fails() {
        assert_eq!(invalid_key("[optimize]\nmetric = alpha\n"), "metric");
    }

    #[test]
    fn top_zero_fails() {
        assert_eq!(invalid_key("[optimize]\ntop = 0\n"), "top");
    }
}
