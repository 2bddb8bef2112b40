//! Typed strategy and backtest settings from a [`ConfigPort`].
//!
//! Parsing is strict: a key that is present but malformed is a
//! [`SimError::ConfigInvalid`], never a silent default. Absent optional keys
//! fall back to the defaults documented on each field.

use std::str::FromStr;

use crate::domain::backtest::BacktestConfig;
use crate::domain::broker::FillModel;
use crate::domain::config_validation::{validate_backtest_config, validate_strategy};
use crate::domain::error::SimError;
use crate::domain::order::{BracketSpec, Side, StopDistance, TakeProfitDistance, TrailingSpec};
use crate::domain::predicate::{Direction, MaKind, MaSpec, NamedPredicate, PredicateSpec};
use crate::domain::signal::{ExitMode, SignalComposer};
use crate::domain::sizing::{KellyParams, SizingMode};
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;

const BACKTEST: &str = "backtest";
const STRATEGY: &str = "strategy";

const DEFAULT_RISK_FRACTION: f64 = 0.01;
const DEFAULT_ATR_PERIOD: usize = 14;

/// Parse and validate both sections. This is what the CLI uses.
pub fn load(config: &dyn ConfigPort) -> Result<(Strategy, BacktestConfig), SimError> {
    let backtest = build_backtest_config(config)?;
    validate_backtest_config(&backtest)?;
    let strategy = build_strategy(config)?;
    validate_strategy(&strategy)?;
    Ok((strategy, backtest))
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SimError> {
    let defaults = BacktestConfig::default();
    let fill_model = match config.get_string(BACKTEST, "fill_model") {
        None => defaults.fill_model,
        Some(raw) => parse_fill_model(&raw)?,
    };

    Ok(BacktestConfig {
        starting_cash: optional(config, BACKTEST, "starting_cash")?
            .unwrap_or(defaults.starting_cash),
        commission_rate: optional(config, BACKTEST, "commission_rate")?
            .unwrap_or(defaults.commission_rate),
        fill_model,
        exposure_ceiling: optional(config, BACKTEST, "exposure_ceiling")?,
        fractional_units: optional_bool(config, BACKTEST, "fractional_units")?
            .unwrap_or(defaults.fractional_units),
        close_at_end: optional_bool(config, BACKTEST, "close_at_end")?
            .unwrap_or(defaults.close_at_end),
        periods_per_year: optional(config, BACKTEST, "periods_per_year")?
            .unwrap_or(defaults.periods_per_year),
        risk_free_rate: optional(config, BACKTEST, "risk_free_rate")?
            .unwrap_or(defaults.risk_free_rate),
    })
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, SimError> {
    if !config.has_section(STRATEGY) {
        return Err(SimError::missing(STRATEGY, "entry"));
    }

    let name = config
        .get_string(STRATEGY, "name")
        .unwrap_or_else(|| "unnamed".to_string());
    let side = match config.get_string(STRATEGY, "side") {
        None => Side::Long,
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "long" => Side::Long,
            "short" => Side::Short,
            other => {
                return Err(SimError::invalid(
                    STRATEGY,
                    "side",
                    format!("unknown side '{}', expected long or short", other),
                ));
            }
        },
    };
    let exit_mode = match config.get_string(STRATEGY, "exit_mode") {
        None => ExitMode::default(),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "all" => ExitMode::All,
            "any" => ExitMode::Any,
            other => {
                return Err(SimError::invalid(
                    STRATEGY,
                    "exit_mode",
                    format!("unknown exit_mode '{}', expected all or any", other),
                ));
            }
        },
    };

    let entry_names = config
        .get_string(STRATEGY, "entry")
        .ok_or_else(|| SimError::missing(STRATEGY, "entry"))?;
    let entry = parse_predicate_list(config, &entry_names)?;
    let exit = match config.get_string(STRATEGY, "exit") {
        Some(names) => parse_predicate_list(config, &names)?,
        None => Vec::new(),
    };

    Ok(Strategy {
        name,
        side,
        signals: SignalComposer::new(entry, exit, exit_mode),
        sizing: parse_sizing(config)?,
        bracket: parse_bracket(config)?,
        max_hold_bars: optional(config, STRATEGY, "max_hold_bars")?,
    })
}

fn parse_fill_model(raw: &str) -> Result<FillModel, SimError> {
    match raw.to_ascii_lowercase().as_str() {
        "next_bar_open" => Ok(FillModel::NextBarOpen),
        "same_bar_close" => Ok(FillModel::SameBarClose),
        other => Err(SimError::invalid(
            BACKTEST,
            "fill_model",
            format!(
                "unknown fill_model '{}', expected next_bar_open or same_bar_close",
                other
            ),
        )),
    }
}

fn parse_sizing(config: &dyn ConfigPort) -> Result<SizingMode, SimError> {
    let mode = config
        .get_string(STRATEGY, "sizing")
        .unwrap_or_else(|| "fixed_fractional".to_string());
    match mode.to_ascii_lowercase().as_str() {
        "fixed_fractional" => Ok(SizingMode::FixedFractional {
            risk_fraction: optional(config, STRATEGY, "risk_fraction")?
                .unwrap_or(DEFAULT_RISK_FRACTION),
        }),
        "kelly" => {
            let defaults = KellyParams::default();
            Ok(SizingMode::Kelly(KellyParams {
                window: optional(config, STRATEGY, "kelly_window")?.unwrap_or(defaults.window),
                min_fraction: optional(config, STRATEGY, "kelly_min")?
                    .unwrap_or(defaults.min_fraction),
                max_fraction: optional(config, STRATEGY, "kelly_max")?
                    .unwrap_or(defaults.max_fraction),
                fallback: optional(config, STRATEGY, "kelly_fallback")?
                    .unwrap_or(defaults.fallback),
            }))
        }
        other => Err(SimError::invalid(
            STRATEGY,
            "sizing",
            format!("unknown sizing '{}', expected fixed_fractional or kelly", other),
        )),
    }
}

fn parse_bracket(config: &dyn ConfigPort) -> Result<BracketSpec, SimError> {
    let stop_pct: Option<f64> = optional(config, STRATEGY, "stop_loss_pct")?;
    let stop_atr: Option<f64> = optional(config, STRATEGY, "stop_atr_multiple")?;
    let stop = match (stop_pct, stop_atr) {
        (Some(_), Some(_)) => {
            return Err(SimError::invalid(
                STRATEGY,
                "stop_loss_pct",
                "stop_loss_pct conflicts with stop_atr_multiple",
            ));
        }
        (Some(pct), None) => Some(StopDistance::Percent(pct)),
        (None, Some(multiple)) => Some(StopDistance::AtrMultiple {
            multiple,
            period: optional(config, STRATEGY, "stop_atr_period")?.unwrap_or(DEFAULT_ATR_PERIOD),
        }),
        (None, None) => None,
    };

    let tp_pct: Option<f64> = optional(config, STRATEGY, "take_profit_pct")?;
    let reward_risk: Option<f64> = optional(config, STRATEGY, "reward_risk")?;
    let take_profit = match (tp_pct, reward_risk) {
        (Some(_), Some(_)) => {
            return Err(SimError::invalid(
                STRATEGY,
                "take_profit_pct",
                "take_profit_pct conflicts with reward_risk",
            ));
        }
        (Some(pct), None) => Some(TakeProfitDistance::Percent(pct)),
        (None, Some(ratio)) => Some(TakeProfitDistance::RewardRisk(ratio)),
        (None, None) => None,
    };

    let trail_atr: Option<f64> = optional(config, STRATEGY, "trail_atr_multiple")?;
    let candidate = TrailingSpec {
        atr: match trail_atr {
            Some(multiple) => Some((
                multiple,
                optional(config, STRATEGY, "trail_atr_period")?.unwrap_or(DEFAULT_ATR_PERIOD),
            )),
            None => None,
        },
        percent: optional(config, STRATEGY, "trail_pct")?,
        channel_period: optional(config, STRATEGY, "trail_channel_period")?,
    };
    // Trailing inputs alone switch trailing on; an explicit flag wins.
    let trailing_on =
        optional_bool(config, STRATEGY, "trailing")?.unwrap_or(!candidate.is_empty());
    let trailing = trailing_on.then_some(candidate);

    Ok(BracketSpec {
        stop,
        take_profit,
        trailing,
    })
}

fn parse_predicate_list(
    config: &dyn ConfigPort,
    names: &str,
) -> Result<Vec<NamedPredicate>, SimError> {
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| parse_predicate(config, name))
        .collect()
}

/// Build the predicate described by section `name`.
pub fn parse_predicate(config: &dyn ConfigPort, name: &str) -> Result<NamedPredicate, SimError> {
    if !config.has_section(name) {
        return Err(SimError::missing(name, "kind"));
    }
    let kind = config
        .get_string(name, "kind")
        .ok_or_else(|| SimError::missing(name, "kind"))?;

    let spec = match kind.to_ascii_lowercase().as_str() {
        "trend" => PredicateSpec::Trend {
            ma: required_ma(config, name, "ma")?,
            direction: direction(config, name, "direction")?.unwrap_or(Direction::Above),
        },
        "momentum" => PredicateSpec::Momentum {
            period: optional(config, name, "period")?.unwrap_or(14),
            lower: optional(config, name, "lower")?,
            upper: optional(config, name, "upper")?,
        },
        "volume" => PredicateSpec::VolumeConfirmation {
            period: optional(config, name, "period")?.unwrap_or(20),
            multiplier: optional(config, name, "multiplier")?.unwrap_or(1.0),
        },
        "volatility_regime" => PredicateSpec::VolatilityRegime {
            atr_period: optional(config, name, "atr_period")?.unwrap_or(DEFAULT_ATR_PERIOD),
            lookback: optional(config, name, "lookback")?.unwrap_or(50),
            min_ratio: optional(config, name, "min_ratio")?,
            max_ratio: optional(config, name, "max_ratio")?,
        },
        "trend_strength" => PredicateSpec::TrendStrength {
            period: optional(config, name, "period")?.unwrap_or(14),
            min_adx: optional(config, name, "min_adx")?.unwrap_or(25.0),
            di_bias: direction(config, name, "di_bias")?,
        },
        "breakout" => PredicateSpec::Breakout {
            period: required(config, name, "period")?,
            direction: direction(config, name, "direction")?.unwrap_or(Direction::Above),
        },
        "crossover" => PredicateSpec::Crossover {
            fast: required_ma(config, name, "fast")?,
            slow: required_ma(config, name, "slow")?,
            direction: direction(config, name, "direction")?.unwrap_or(Direction::Above),
        },
        "regime_weakening" => PredicateSpec::RegimeWeakening {
            period: optional(config, name, "period")?.unwrap_or(14),
            max_adx: optional(config, name, "max_adx")?.unwrap_or(20.0),
        },
        other => {
            return Err(SimError::invalid(
                name,
                "kind",
                format!("unknown predicate kind '{}'", other),
            ));
        }
    };
    Ok(NamedPredicate::new(name, spec))
}

/// Parse `sma:50` / `ema:12`. A bare number means an SMA.
pub fn parse_ma_spec(raw: &str) -> Option<MaSpec> {
    let raw = raw.trim();
    let (kind, period) = match raw.split_once(':') {
        Some((kind, period)) => (kind.trim().to_ascii_lowercase(), period.trim()),
        None => ("sma".to_string(), raw),
    };
    let kind = match kind.as_str() {
        "sma" => MaKind::Sma,
        "ema" => MaKind::Ema,
        _ => return None,
    };
    let period = period.parse().ok()?;
    Some(MaSpec { kind, period })
}

fn required_ma(config: &dyn ConfigPort, section: &str, key: &str) -> Result<MaSpec, SimError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| SimError::missing(section, key))?;
    parse_ma_spec(&raw).ok_or_else(|| {
        SimError::invalid(
            section,
            key,
            format!("'{}' is not a moving average like sma:50 or ema:12", raw),
        )
    })
}

fn direction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Direction>, SimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "above" | "up" | "long" => Ok(Some(Direction::Above)),
            "below" | "down" | "short" => Ok(Some(Direction::Below)),
            other => Err(SimError::invalid(
                section,
                key,
                format!("unknown direction '{}', expected above or below", other),
            )),
        },
    }
}

fn optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, SimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            SimError::invalid(section, key, format!("cannot parse '{}'", raw))
        }),
    }
}

fn required<T: FromStr>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, SimError> {
    optional(config, section, key)?.ok_or_else(|| SimError::missing(section, key))
}

fn optional_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, SimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(Some(true)),
            "false" | "no" | "0" | "off" => Ok(Some(false)),
            _ => Err(SimError::invalid(
                section,
                key,
                format!("'{}' is not a boolean", raw),
            )),
        },
    }
}
