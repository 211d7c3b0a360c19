//! Strategy variants and their parameter handling.
//!
//! A [`Strategy`] is one fully parameterised signal rule. [`StrategyKind`] is
//! the unparameterised name used by the CLI and the grid search to build
//! strategies from a [`Params`] set.

use std::fmt;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::domain::error::QuantboardError;
use crate::domain::indicator::{
    bollinger, calculate_bollinger, calculate_donchian, calculate_rsi, calculate_sma,
    IndicatorSeries,
};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::position::PositionSeries;
use crate::domain::signal;

/// Ordered named parameter values, e.g. `fast=5, slow=20`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params(Vec<(String, f64)>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Replaces an existing value or appends a new one.
    pub fn set(&mut self, name: &str, value: f64) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses `name=value` pairs.
    pub fn parse_assignments<S: AsRef<str>>(items: &[S]) -> Result<Self, QuantboardError> {
        let mut params = Params::new();
        for item in items {
            let item = item.as_ref();
            let (name, value) = item.split_once('=').ok_or_else(|| {
                QuantboardError::invalid_parameter(item, "expected name=value")
            })?;
            let value: f64 = value.trim().parse().map_err(|_| {
                QuantboardError::invalid_parameter(name.trim(), format!("'{value}' is not a number"))
            })?;
            params.set(name.trim(), value);
        }
        Ok(params)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(n, v)| format!("{n}={v}")).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    SmaCrossover,
    RsiThreshold,
    BollingerMeanReversion,
    DonchianBreakout,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::SmaCrossover,
        StrategyKind::RsiThreshold,
        StrategyKind::BollingerMeanReversion,
        StrategyKind::DonchianBreakout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::SmaCrossover => "sma-crossover",
            StrategyKind::RsiThreshold => "rsi",
            StrategyKind::BollingerMeanReversion => "bollinger",
            StrategyKind::DonchianBreakout => "donchian",
        }
    }

    pub fn default_params(&self) -> Params {
        match self {
            StrategyKind::SmaCrossover => Params::new().with("fast", 20.0).with("slow", 50.0),
            StrategyKind::RsiThreshold => Params::new()
                .with("period", 14.0)
                .with("oversold", 30.0)
                .with("overbought", 70.0),
            StrategyKind::BollingerMeanReversion => Params::new()
                .with("window", bollinger::DEFAULT_PERIOD as f64)
                .with("k", bollinger::DEFAULT_MULTIPLIER),
            StrategyKind::DonchianBreakout => Params::new().with("entry", 20.0).with("exit", 20.0),
        }
    }

    /// `InvalidParameter` unless `name` is one of this strategy's parameters.
    pub fn check_param_name(&self, name: &str) -> Result<(), QuantboardError> {
        if self.default_params().get(name).is_none() {
            return Err(QuantboardError::invalid_parameter(
                name,
                format!("unknown parameter for {}", self.name()),
            ));
        }
        Ok(())
    }

    /// Builds and validates a strategy. Missing parameters take defaults.
    pub fn build(&self, params: &Params) -> Result<Strategy, QuantboardError> {
        let defaults = self.default_params();
        for (name, _) in params.iter() {
            self.check_param_name(name)?;
        }
        let value = |name: &str| params.get(name).or(defaults.get(name)).unwrap_or(0.0);

        let strategy = match self {
            StrategyKind::SmaCrossover => Strategy::SmaCrossover {
                fast: window_param("fast", value("fast"))?,
                slow: window_param("slow", value("slow"))?,
            },
            StrategyKind::RsiThreshold => Strategy::RsiThreshold {
                period: window_param("period", value("period"))?,
                oversold: value("oversold"),
                overbought: value("overbought"),
            },
            StrategyKind::BollingerMeanReversion => Strategy::BollingerMeanReversion {
                window: window_param("window", value("window"))?,
                multiplier: value("k"),
            },
            StrategyKind::DonchianBreakout => Strategy::DonchianBreakout {
                entry: window_param("entry", value("entry"))?,
                exit: window_param("exit", value("exit"))?,
            },
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = QuantboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "sma-crossover" | "sma" | "crossover" => Ok(StrategyKind::SmaCrossover),
            "rsi" | "rsi-threshold" => Ok(StrategyKind::RsiThreshold),
            "bollinger" | "bollinger-mr" | "mean-reversion" => {
                Ok(StrategyKind::BollingerMeanReversion)
            }
            "donchian" | "breakout" | "donchian-breakout" => Ok(StrategyKind::DonchianBreakout),
            other => Err(QuantboardError::invalid_parameter(
                "strategy",
                format!("unknown strategy '{other}'"),
            )),
        }
    }
}

fn window_param(name: &str, value: f64) -> Result<usize, QuantboardError> {
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(QuantboardError::invalid_parameter(
            name,
            format!("window must be a positive integer, got {value}"),
        ));
    }
    if value >= usize::MAX as f64 {
        return Err(QuantboardError::invalid_parameter(
            name,
            format!("window {value} is out of range"),
        ));
    }
    Ok(value as usize)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    SmaCrossover {
        fast: usize,
        slow: usize,
    },
    RsiThreshold {
        period: usize,
        oversold: f64,
        overbought: f64,
    },
    BollingerMeanReversion {
        window: usize,
        multiplier: f64,
    },
    DonchianBreakout {
        entry: usize,
        exit: usize,
    },
}

/// A named indicator series for chart overlays.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub name: &'static str,
    pub series: IndicatorSeries,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySignals {
    pub positions: PositionSeries,
    pub overlays: Vec<Overlay>,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::SmaCrossover { .. } => StrategyKind::SmaCrossover,
            Strategy::RsiThreshold { .. } => StrategyKind::RsiThreshold,
            Strategy::BollingerMeanReversion { .. } => StrategyKind::BollingerMeanReversion,
            Strategy::DonchianBreakout { .. } => StrategyKind::DonchianBreakout,
        }
    }

    pub fn params(&self) -> Params {
        match *self {
            Strategy::SmaCrossover { fast, slow } => Params::new()
                .with("fast", fast as f64)
                .with("slow", slow as f64),
            Strategy::RsiThreshold {
                period,
                oversold,
                overbought,
            } => Params::new()
                .with("period", period as f64)
                .with("oversold", oversold)
                .with("overbought", overbought),
            Strategy::BollingerMeanReversion { window, multiplier } => Params::new()
                .with("window", window as f64)
                .with("k", multiplier),
            Strategy::DonchianBreakout { entry, exit } => Params::new()
                .with("entry", entry as f64)
                .with("exit", exit as f64),
        }
    }

    /// Parameter consistency independent of any price series.
    pub fn validate(&self) -> Result<(), QuantboardError> {
        match *self {
            Strategy::SmaCrossover { fast, slow } => {
                if fast == 0 || slow == 0 {
                    return Err(QuantboardError::invalid_parameter(
                        "fast/slow",
                        "windows must be at least 1",
                    ));
                }
                if fast >= slow {
                    return Err(QuantboardError::invalid_parameter(
                        "fast",
                        format!("fast ({fast}) must be less than slow ({slow})"),
                    ));
                }
            }
            Strategy::RsiThreshold {
                period,
                oversold,
                overbought,
            } => {
                if period == 0 {
                    return Err(QuantboardError::invalid_parameter(
                        "period",
                        "window must be at least 1",
                    ));
                }
                signal::validate_thresholds(oversold, overbought)?;
            }
            Strategy::BollingerMeanReversion { window, multiplier } => {
                if window == 0 {
                    return Err(QuantboardError::invalid_parameter(
                        "window",
                        "window must be at least 1",
                    ));
                }
                if !multiplier.is_finite() || multiplier <= 0.0 {
                    return Err(QuantboardError::invalid_parameter(
                        "k",
                        format!("multiplier must be positive, got {multiplier}"),
                    ));
                }
            }
            Strategy::DonchianBreakout { entry, exit } => {
                if entry == 0 || exit == 0 {
                    return Err(QuantboardError::invalid_parameter(
                        "entry/exit",
                        "windows must be at least 1",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Bars needed before the first defined signal.
    pub fn lookback(&self) -> usize {
        match *self {
            Strategy::SmaCrossover { fast, slow } => fast.max(slow),
            Strategy::RsiThreshold { period, .. } => period.saturating_add(1),
            Strategy::BollingerMeanReversion { window, .. } => window,
            Strategy::DonchianBreakout { entry, exit } => entry.max(exit).saturating_add(1),
        }
    }

    pub fn generate(&self, series: &PriceSeries) -> Result<StrategySignals, QuantboardError> {
        self.validate()?;
        match *self {
            Strategy::SmaCrossover { fast, slow } => {
                let fast_sma = calculate_sma(series, fast)?;
                let slow_sma = calculate_sma(series, slow)?;
                let positions = signal::sma_crossover(&fast_sma, &slow_sma)?;
                Ok(StrategySignals {
                    positions,
                    overlays: vec![
                        Overlay {
                            name: "sma_fast",
                            series: fast_sma,
                        },
                        Overlay {
                            name: "sma_slow",
                            series: slow_sma,
                        },
                    ],
                })
            }
            Strategy::RsiThreshold {
                period,
                oversold,
                overbought,
            } => {
                let rsi = calculate_rsi(series, period)?;
                let positions = signal::rsi_threshold(&rsi, oversold, overbought)?;
                Ok(StrategySignals {
                    positions,
                    overlays: vec![Overlay {
                        name: "rsi",
                        series: rsi,
                    }],
                })
            }
            Strategy::BollingerMeanReversion { window, multiplier } => {
                let bands = calculate_bollinger(series, window, multiplier)?;
                let positions = signal::bollinger_mean_reversion(series, &bands)?;
                Ok(StrategySignals {
                    positions,
                    overlays: vec![
                        Overlay {
                            name: "bb_upper",
                            series: bands.upper,
                        },
                        Overlay {
                            name: "bb_middle",
                            series: bands.middle,
                        },
                        Overlay {
                            name: "bb_lower",
                            series: bands.lower,
                        },
                    ],
                })
            }
            Strategy::DonchianBreakout { entry, exit } => {
                let channel = calculate_donchian(series, entry, exit)?;
                let positions = signal::donchian_breakout(series, &channel)?;
                Ok(StrategySignals {
                    positions,
                    overlays: vec![
                        Overlay {
                            name: "donchian_upper",
                            series: channel.upper,
                        },
                        Overlay {
                            name: "donchian_lower",
                            series: channel.lower,
                        },
                    ],
                })
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.params())
    }
}
