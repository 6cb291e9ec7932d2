//! Market and account snapshots returned by the broker terminal.

use chrono::{NaiveDate, NaiveDateTime};

/// One daily price bar.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: u64,
}

impl DailyBar {
    /// A day counts as traded when at least one tick was recorded.
    pub fn is_trading_day(&self) -> bool {
        self.tick_volume > 0
    }
}

/// Number of trading days among `bars` whose date lies in `from..=to`.
pub fn count_trading_days(bars: &[DailyBar], from: NaiveDate, to: NaiveDate) -> u32 {
    let count = bars
        .iter()
        .filter(|b| b.date >= from && b.date <= to && b.is_trading_day())
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// High/low of a completed period (a monthly bar).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodRange {
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub equity: f64,
    pub balance: f64,
}

/// Trading properties and current quote of a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub name: String,
    pub point: f64,
    pub digits: u32,
    pub ask: f64,
    pub bid: f64,
    pub volume_min: f64,
    pub tick_value: f64,
    pub tick_size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionInfo {
    pub ticket: u64,
    pub magic: i64,
    pub symbol: String,
    pub opened_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DealInfo {
    pub ticket: u64,
    pub magic: i64,
    pub symbol: String,
    pub time: NaiveDateTime,
}
