//! simtrader: event-driven single-asset strategy backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], the command-line driver in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
