//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod position;
pub mod signal;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod pipeline;
pub mod optimizer;
pub mod config_validation;
pub mod error;
