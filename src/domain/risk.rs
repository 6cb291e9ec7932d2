//! Risk-based stop-loss and position sizing.
//!
//! The volume of a new position is chosen so that hitting the stop loses
//! `risk_percent` of account equity:
//!
//! ```text
//! risk_amount = equity * risk_percent / 100
//! point_value = tick_value / (tick_size / point)
//! volume      = risk_amount / distance_points / point_value
//! ```
//!
//! The result is rounded down to the lot step the broker accepts.

use crate::domain::error::SizingError;
use crate::domain::market::{AccountSnapshot, SymbolInfo};
use crate::domain::signal::{Direction, StopLoss, StopLossKind};

const ROUNDING_EPSILON: f64 = 1e-9;

/// Round `value` to `digits` decimals, the symbol's quoted precision.
pub fn round_to_digits(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Stop-loss price for an entry at `entry_price`.
///
/// Percentage stops sit `value` percent of the price away from the entry,
/// point stops `value * point` away. Long stops are below the entry, short
/// stops above.
pub fn stoploss_price(
    entry_price: f64,
    direction: Direction,
    stoploss: &StopLoss,
    point: f64,
    digits: u32,
) -> f64 {
    let offset = match stoploss.kind {
        StopLossKind::Percentage => entry_price * 0.01 * stoploss.value,
        StopLossKind::Points => stoploss.value * point,
    };
    let price = match direction {
        Direction::Long => entry_price - offset,
        Direction::Short => entry_price + offset,
    };
    round_to_digits(price, digits)
}

/// Number of decimals implied by the broker's minimum lot.
///
/// 1 → 0, 0.1 → 1, 0.01 → 2, 0.001 → 3. Anything finer, or a non-positive
/// lot, is a configuration error.
pub fn lot_decimals(min_lot: f64) -> Result<u32, SizingError> {
    if !min_lot.is_finite() || min_lot <= 0.0 {
        return Err(SizingError::LotPrecision { min_lot });
    }
    (0..=3u32)
        .find(|&decimals| {
            let scaled = min_lot * 10f64.powi(decimals as i32);
            (scaled - scaled.round()).abs() < ROUNDING_EPSILON * scaled.max(1.0)
        })
        .ok_or(SizingError::LotPrecision { min_lot })
}

fn floor_to_decimals(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    ((value * factor) + ROUNDING_EPSILON).floor() / factor
}

/// Inputs of [`position_volume`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingInput {
    pub equity: f64,
    pub risk_percent: f64,
    /// Entry-to-stop distance in points.
    pub distance: f64,
    pub tick_value: f64,
    pub tick_size: f64,
    pub point: f64,
    pub min_lot: f64,
}

fn require_positive(field: &'static str, value: f64) -> Result<(), SizingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SizingError::InvalidInput { field, value })
    }
}

/// Position volume risking `risk_percent` of equity over `distance` points.
///
/// Steps:
/// 1. Resolve the lot precision from `min_lot`
/// 2. Refuse a zero stop distance instead of dividing by it
/// 3. Compute risk amount and value of one point per lot
/// 4. Round the raw volume down to the lot precision
/// 5. Refuse volumes below the minimum lot
pub fn position_volume(input: &SizingInput) -> Result<f64, SizingError> {
    let decimals = lot_decimals(input.min_lot)?;

    if !input.distance.is_finite() || input.distance.abs() < f64::EPSILON {
        return Err(SizingError::ZeroDistance);
    }
    require_positive("distance", input.distance)?;
    require_positive("equity", input.equity)?;
    require_positive("risk_percent", input.risk_percent)?;
    require_positive("tick_value", input.tick_value)?;
    require_positive("tick_size", input.tick_size)?;
    require_positive("point", input.point)?;

    let risk_amount = input.equity * input.risk_percent / 100.0;
    let point_value = input.tick_value / (input.tick_size / input.point);
    let raw_volume = risk_amount / input.distance / point_value;
    let volume = floor_to_decimals(raw_volume, decimals);

    if volume + ROUNDING_EPSILON < input.min_lot {
        return Err(SizingError::BelowMinLot {
            volume,
            min_lot: input.min_lot,
        });
    }
    Ok(volume)
}

/// Price, stop and volume of a market entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPlan {
    pub price: f64,
    pub stoploss_price: f64,
    pub volume: f64,
}

/// Size a market entry at the current quote: longs buy at the ask, shorts
/// sell at the bid.
pub fn plan_entry(
    account: &AccountSnapshot,
    info: &SymbolInfo,
    direction: Direction,
    stoploss: &StopLoss,
    risk_percent: f64,
) -> Result<EntryPlan, SizingError> {
    require_positive("point", info.point)?;

    let price = match direction {
        Direction::Long => info.ask,
        Direction::Short => info.bid,
    };
    let stop = stoploss_price(price, direction, stoploss, info.point, info.digits);
    let distance = ((price - stop).abs() / info.point).round();

    let volume = position_volume(&SizingInput {
        equity: account.equity,
        risk_percent,
        distance,
        tick_value: info.tick_value,
        tick_size: info.tick_size,
        point: info.point,
        min_lot: info.volume_min,
    })?;

    Ok(EntryPlan {
        price,
        stoploss_price: stop,
        volume,
    })
}
