//! Configuration validation.
//!
//! Validates all config fields before the engine starts.

use crate::domain::error::TraderError;
use crate::domain::market::SymbolInfo;
use crate::domain::risk;
use crate::ports::config_port::ConfigPort;

/// Sections named `symbol.<NAME>` describe the symbols a paper broker quotes.
pub const SYMBOL_SECTION_PREFIX: &str = "symbol.";

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_signals_file(config)?;
    validate_min_int(config, "interval_seconds", 5, 1)?;
    validate_min_int(config, "deviation", 20, 0)?;
    validate_min_int(config, "open_grace_minutes", 60, 0)?;
    validate_min_int(config, "heartbeat_evaluations", 12, 1)?;
    validate_min_int(config, "history_lookback_days", 365, 0)?;
    validate_min_int(config, "history_lookahead_days", 2, 0)?;
    validate_min_int(config, "sizing_backoff_seconds", 60, 0)?;
    validate_min_int(config, "tick_budget_seconds", 30, 1)?;
    Ok(())
}

pub fn validate_broker_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_broker_kind(config)?;
    validate_paper_account(config)?;
    let names = symbol_names(config);
    if names.is_empty() {
        return Err(TraderError::ConfigMissing {
            section: format!("{SYMBOL_SECTION_PREFIX}<NAME>"),
            key: "point".to_string(),
        });
    }
    for name in names {
        symbol_info(config, &name)?;
    }
    Ok(())
}

fn validate_signals_file(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("engine", "signals_file") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TraderError::ConfigMissing {
            section: "engine".to_string(),
            key: "signals_file".to_string(),
        }),
    }
}

fn validate_min_int(
    config: &dyn ConfigPort,
    key: &str,
    default: i64,
    min: i64,
) -> Result<(), TraderError> {
    if let Some(raw) = config.get_string("engine", key) {
        if raw.trim().parse::<i64>().is_err() {
            return Err(TraderError::ConfigInvalid {
                section: "engine".to_string(),
                key: key.to_string(),
                reason: format!("{key} must be an integer"),
            });
        }
    }
    let value = config.get_int("engine", key, default);
    if value < min {
        return Err(TraderError::ConfigInvalid {
            section: "engine".to_string(),
            key: key.to_string(),
            reason: format!("{key} must be at least {min}"),
        });
    }
    Ok(())
}

fn validate_broker_kind(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("broker", "kind") {
        None => Ok(()),
        Some(kind) if kind.trim().eq_ignore_ascii_case("paper") => Ok(()),
        Some(kind) => Err(TraderError::ConfigInvalid {
            section: "broker".to_string(),
            key: "kind".to_string(),
            reason: format!("unsupported broker kind {kind:?}, expected paper"),
        }),
    }
}

fn validate_paper_account(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let equity = config.get_double("paper", "equity", 10_000.0);
    if equity <= 0.0 {
        return Err(TraderError::ConfigInvalid {
            section: "paper".to_string(),
            key: "equity".to_string(),
            reason: "equity must be positive".to_string(),
        });
    }
    let balance = config.get_double("paper", "balance", equity);
    if balance < 0.0 {
        return Err(TraderError::ConfigInvalid {
            section: "paper".to_string(),
            key: "balance".to_string(),
            reason: "balance must be non-negative".to_string(),
        });
    }
    Ok(())
}

/// Symbols declared through `[symbol.<NAME>]` sections, sorted.
pub fn symbol_names(config: &dyn ConfigPort) -> Vec<String> {
    let mut names: Vec<String> = config
        .sections()
        .into_iter()
        .filter_map(|s| s.strip_prefix(SYMBOL_SECTION_PREFIX).map(str::to_string))
        .filter(|s| !s.is_empty())
        .collect();
    names.sort();
    names
}

fn required_double(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, TraderError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| TraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{raw:?} is not a number"),
        })
}

fn positive(section: &str, key: &str, value: f64) -> Result<f64, TraderError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be positive"),
        })
    }
}

/// Read and validate the `[symbol.<name>]` section.
pub fn symbol_info(config: &dyn ConfigPort, name: &str) -> Result<SymbolInfo, TraderError> {
    let section = format!("{SYMBOL_SECTION_PREFIX}{name}");
    let s = section.as_str();
    let field = |key: &str| required_double(config, s, key).and_then(|v| positive(s, key, v));

    let point = field("point")?;
    let digits = required_double(config, s, "digits")?;
    if digits < 0.0 || digits > 10.0 || digits.fract() != 0.0 {
        return Err(TraderError::ConfigInvalid {
            section: section.clone(),
            key: "digits".to_string(),
            reason: "digits must be a whole number between 0 and 10".to_string(),
        });
    }
    let ask = field("ask")?;
    let bid = field("bid")?;
    if bid > ask {
        return Err(TraderError::ConfigInvalid {
            section: section.clone(),
            key: "bid".to_string(),
            reason: "bid must not exceed ask".to_string(),
        });
    }
    let volume_min = field("volume_min")?;
    risk::lot_decimals(volume_min).map_err(|e| TraderError::ConfigInvalid {
        section: section.clone(),
        key: "volume_min".to_string(),
        reason: e.to_string(),
    })?;

    Ok(SymbolInfo {
        name: name.to_string(),
        point,
        digits: digits as u32,
        ask,
        bid,
        volume_min,
        tick_value: field("tick_value")?,
        tick_size: field("tick_size")?,
    })
}
