//! Core domain types and simulation logic.

pub mod backtest;
pub mod broker;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod ledger;
pub mod metrics;
pub mod ohlcv;
pub mod order;
pub mod position;
pub mod predicate;
pub mod signal;
pub mod sizing;
pub mod strategy;
pub mod strategy_config;
pub mod sweep;
