#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use simtrader::domain::backtest::BacktestConfig;
use simtrader::domain::broker::FillModel;
use simtrader::domain::error::SimError;
pub use simtrader::domain::ohlcv::Bar;
use simtrader::domain::order::{BracketSpec, Side, StopDistance, TakeProfitDistance};
use simtrader::domain::predicate::{Direction, MaSpec, NamedPredicate, PredicateSpec};
use simtrader::domain::signal::{ExitMode, SignalComposer};
use simtrader::domain::sizing::SizingMode;
use simtrader::domain::strategy::Strategy;
use simtrader::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, source: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(source.to_string(), bars);
        self
    }

    pub fn with_error(mut self, source: &str, reason: &str) -> Self {
        self.errors.insert(source.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, source: &str) -> Result<Vec<Bar>, SimError> {
        if let Some(reason) = self.errors.get(source) {
            return Err(SimError::Data {
                index: 0,
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(source).cloned().unwrap_or_default())
    }
}

pub fn day(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i as i64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: day(i),
        open,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

/// Bars with open = high = low = close.
pub fn flat_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c, c, c, c))
        .collect()
}

/// Bars opening at the previous close, with a small wick on both sides.
pub fn path_bars(closes: &[f64]) -> Vec<Bar> {
    let mut prev = closes.first().copied().unwrap_or(100.0);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let bar = make_bar(i, prev, prev.max(c) * 1.002, prev.min(c) * 0.998, c);
            prev = c;
            bar
        })
        .collect()
}

/// Deterministic zig-zag trend, long enough for 20-period indicators.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + 0.1 * i as f64 + 8.0 * ((i as f64) / 6.0).sin())
        .collect()
}

pub fn trend(period: usize, direction: Direction) -> NamedPredicate {
    NamedPredicate::new(
        "trend",
        PredicateSpec::Trend {
            ma: MaSpec::sma(period),
            direction,
        },
    )
}

pub fn crossover(name: &str, fast: usize, slow: usize, direction: Direction) -> NamedPredicate {
    NamedPredicate::new(
        name,
        PredicateSpec::Crossover {
            fast: MaSpec::sma(fast),
            slow: MaSpec::sma(slow),
            direction,
        },
    )
}

pub fn percent_bracket(stop: f64, target: Option<f64>) -> BracketSpec {
    BracketSpec {
        stop: Some(StopDistance::Percent(stop)),
        take_profit: target.map(TakeProfitDistance::Percent),
        trailing: None,
    }
}

pub fn make_strategy(entry: Vec<NamedPredicate>, exit: Vec<NamedPredicate>) -> Strategy {
    Strategy {
        name: "test".into(),
        side: Side::Long,
        signals: SignalComposer::new(entry, exit, ExitMode::Any),
        sizing: SizingMode::FixedFractional {
            risk_fraction: 0.01,
        },
        bracket: percent_bracket(0.05, None),
        max_hold_bars: None,
    }
}

/// Long crossover strategy over SMA(3)/SMA(8) with a 5% stop.
pub fn cross_strategy() -> Strategy {
    make_strategy(
        vec![crossover("golden", 3, 8, Direction::Above)],
        vec![crossover("death", 3, 8, Direction::Below)],
    )
}

pub fn make_config() -> BacktestConfig {
    BacktestConfig {
        starting_cash: 100_000.0,
        commission_rate: 0.001,
        fill_model: FillModel::NextBarOpen,
        ..BacktestConfig::default()
    }
}

pub fn write_temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
