//! Validation of typed configuration values.
//!
//! Runs once before any simulation; a failure means the run never starts.
//! Section and key names in errors match the INI layout.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::SimError;
use crate::domain::order::{BracketSpec, StopDistance, TakeProfitDistance, TrailingSpec};
use crate::domain::predicate::{MaSpec, NamedPredicate, PredicateSpec};
use crate::domain::sizing::{KellyParams, SizingMode};
use crate::domain::strategy::Strategy;

/// Upper bound on any lookback period.
pub const MAX_PERIOD: usize = 1_000_000;

fn period_in_range(period: usize) -> bool {
    (1..=MAX_PERIOD).contains(&period)
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), SimError> {
    if !config.starting_cash.is_finite() || config.starting_cash <= 0.0 {
        return Err(SimError::invalid(
            "backtest",
            "starting_cash",
            "starting_cash must be positive",
        ));
    }
    if !(0.0..1.0).contains(&config.commission_rate) {
        return Err(SimError::invalid(
            "backtest",
            "commission_rate",
            "commission_rate must be in [0, 1)",
        ));
    }
    if let Some(ceiling) = config.exposure_ceiling {
        if !ceiling.is_finite() || ceiling <= 0.0 {
            return Err(SimError::invalid(
                "backtest",
                "exposure_ceiling",
                "exposure_ceiling must be positive",
            ));
        }
    }
    if !config.periods_per_year.is_finite() || config.periods_per_year <= 0.0 {
        return Err(SimError::invalid(
            "backtest",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    if !(0.0..1.0).contains(&config.risk_free_rate) {
        return Err(SimError::invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

pub fn validate_strategy(strategy: &Strategy) -> Result<(), SimError> {
    if strategy.signals.entry.is_empty() {
        return Err(SimError::missing("strategy", "entry"));
    }
    for predicate in strategy.signals.entry.iter().chain(&strategy.signals.exit) {
        validate_predicate(predicate)?;
    }
    validate_sizing(&strategy.sizing, &strategy.bracket)?;
    validate_bracket(&strategy.bracket)?;
    if strategy.max_hold_bars == Some(0) {
        return Err(SimError::invalid(
            "strategy",
            "max_hold_bars",
            "max_hold_bars must be at least 1",
        ));
    }
    Ok(())
}

fn validate_sizing(sizing: &SizingMode, bracket: &BracketSpec) -> Result<(), SimError> {
    match sizing {
        SizingMode::FixedFractional { risk_fraction } => {
            if !(*risk_fraction > 0.0 && *risk_fraction <= 1.0) {
                return Err(SimError::invalid(
                    "strategy",
                    "risk_fraction",
                    "risk_fraction must be in (0, 1]",
                ));
            }
            if bracket.stop.is_none() {
                return Err(SimError::invalid(
                    "strategy",
                    "sizing",
                    "fixed_fractional sizing requires a stop distance",
                ));
            }
        }
        SizingMode::Kelly(params) => validate_kelly(params)?,
    }
    Ok(())
}

fn validate_kelly(params: &KellyParams) -> Result<(), SimError> {
    if params.window < 2 {
        return Err(SimError::invalid(
            "strategy",
            "kelly_window",
            "kelly_window must be at least 2",
        ));
    }
    let KellyParams {
        min_fraction: min,
        max_fraction: max,
        fallback,
        ..
    } = *params;
    if !(min > 0.0 && min <= fallback && fallback <= max && max <= 1.0) {
        return Err(SimError::invalid(
            "strategy",
            "kelly_min",
            format!(
                "kelly bounds must satisfy 0 < min <= fallback <= max <= 1 (got {}, {}, {})",
                min, fallback, max
            ),
        ));
    }
    Ok(())
}

fn validate_bracket(bracket: &BracketSpec) -> Result<(), SimError> {
    match bracket.stop {
        Some(StopDistance::Percent(pct)) if !(pct > 0.0 && pct < 1.0) => {
            return Err(SimError::invalid(
                "strategy",
                "stop_loss_pct",
                "stop_loss_pct must be in (0, 1)",
            ));
        }
        Some(StopDistance::AtrMultiple { multiple, period }) => {
            if !(multiple > 0.0 && multiple.is_finite()) {
                return Err(SimError::invalid(
                    "strategy",
                    "stop_atr_multiple",
                    "stop_atr_multiple must be positive",
                ));
            }
            if !period_in_range(period) {
                return Err(SimError::invalid(
                    "strategy",
                    "stop_atr_period",
                    format!("stop_atr_period must be in [1, {}]", MAX_PERIOD),
                ));
            }
        }
        _ => {}
    }

    match bracket.take_profit {
        Some(TakeProfitDistance::Percent(pct)) if !(pct > 0.0 && pct.is_finite()) => {
            return Err(SimError::invalid(
                "strategy",
                "take_profit_pct",
                "take_profit_pct must be positive",
            ));
        }
        Some(TakeProfitDistance::RewardRisk(ratio)) => {
            if !(ratio > 0.0 && ratio.is_finite()) {
                return Err(SimError::invalid(
                    "strategy",
                    "reward_risk",
                    "reward_risk must be positive",
                ));
            }
            if bracket.stop.is_none() {
                return Err(SimError::invalid(
                    "strategy",
                    "reward_risk",
                    "reward_risk requires a stop distance",
                ));
            }
        }
        _ => {}
    }

    if let Some(trailing) = &bracket.trailing {
        validate_trailing(trailing)?;
    }
    Ok(())
}

fn validate_trailing(trailing: &TrailingSpec) -> Result<(), SimError> {
    if trailing.is_empty() {
        return Err(SimError::invalid(
            "strategy",
            "trailing",
            "trailing needs trail_atr_multiple, trail_pct or trail_channel_period",
        ));
    }
    if let Some((multiple, period)) = trailing.atr {
        if !(multiple > 0.0 && multiple.is_finite()) || !period_in_range(period) {
            return Err(SimError::invalid(
                "strategy",
                "trail_atr_multiple",
                "trailing ATR multiple and period must be positive",
            ));
        }
    }
    if let Some(pct) = trailing.percent {
        if !(pct > 0.0 && pct < 1.0) {
            return Err(SimError::invalid(
                "strategy",
                "trail_pct",
                "trail_pct must be in (0, 1)",
            ));
        }
    }
    if let Some(period) = trailing.channel_period {
        if !period_in_range(period) {
            return Err(SimError::invalid(
                "strategy",
                "trail_channel_period",
                format!("trail_channel_period must be in [1, {}]", MAX_PERIOD),
            ));
        }
    }
    Ok(())
}

pub fn validate_predicate(predicate: &NamedPredicate) -> Result<(), SimError> {
    let section = predicate.name.as_str();
    let positive = |key: &str, value: usize| {
        if period_in_range(value) {
            Ok(())
        } else {
            Err(SimError::invalid(
                section,
                key,
                format!("{} must be in [1, {}]", key, MAX_PERIOD),
            ))
        }
    };
    let ordered_band = |key: &str, lower: Option<f64>, upper: Option<f64>| match (lower, upper) {
        (None, None) => Err(SimError::invalid(section, key, "at least one bound is required")),
        (Some(lo), Some(hi)) if lo >= hi => Err(SimError::invalid(
            section,
            key,
            format!("lower bound {} must be below upper bound {}", lo, hi),
        )),
        _ => Ok(()),
    };

    match &predicate.spec {
        PredicateSpec::Trend { ma, .. } => positive_ma(section, "ma", ma),
        PredicateSpec::Momentum {
            period,
            lower,
            upper,
        } => {
            positive("period", *period)?;
            for bound in [lower, upper].into_iter().flatten() {
                if !(0.0..=100.0).contains(bound) {
                    return Err(SimError::invalid(
                        section,
                        "lower",
                        "RSI bounds must be within [0, 100]",
                    ));
                }
            }
            ordered_band("lower", *lower, *upper)
        }
        PredicateSpec::VolumeConfirmation { period, multiplier } => {
            positive("period", *period)?;
            if !(*multiplier > 0.0 && multiplier.is_finite()) {
                return Err(SimError::invalid(
                    section,
                    "multiplier",
                    "multiplier must be positive",
                ));
            }
            Ok(())
        }
        PredicateSpec::VolatilityRegime {
            atr_period,
            lookback,
            min_ratio,
            max_ratio,
        } => {
            positive("atr_period", *atr_period)?;
            positive("lookback", *lookback)?;
            ordered_band("min_ratio", *min_ratio, *max_ratio)
        }
        PredicateSpec::TrendStrength {
            period, min_adx, ..
        } => {
            positive("period", *period)?;
            if !(0.0..=100.0).contains(min_adx) {
                return Err(SimError::invalid(
                    section,
                    "min_adx",
                    "min_adx must be within [0, 100]",
                ));
            }
            Ok(())
        }
        PredicateSpec::Breakout { period, .. } => positive("period", *period),
        PredicateSpec::Crossover { fast, slow, .. } => {
            positive_ma(section, "fast", fast)?;
            positive_ma(section, "slow", slow)?;
            if fast.period >= slow.period {
                return Err(SimError::invalid(
                    section,
                    "fast",
                    format!(
                        "fast period {} must be below slow period {}",
                        fast.period, slow.period
                    ),
                ));
            }
            Ok(())
        }
        PredicateSpec::RegimeWeakening { period, max_adx } => {
            positive("period", *period)?;
            if !(*max_adx > 0.0 && *max_adx <= 100.0) {
                return Err(SimError::invalid(
                    section,
                    "max_adx",
                    "max_adx must be within (0, 100]",
                ));
            }
            Ok(())
        }
    }
}

fn positive_ma(section: &str, key: &str, ma: &MaSpec) -> Result<(), SimError> {
    if !period_in_range(ma.period) {
        return Err(SimError::invalid(
            section,
            key,
            format!("moving average period must be in [1, {}]", MAX_PERIOD),
        ));
    }
    Ok(())
}
