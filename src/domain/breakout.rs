//! Breakout signals: open when price leaves the previous month's range and
//! hold for a number of trading days.

use chrono::{Datelike, NaiveDateTime};
use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::market::{PeriodRange, count_trading_days};
use crate::domain::signal::{Action, Status, TriggerContext};
use crate::ports::broker_port::BrokerPort;

/// Which side of the previous month's range must be broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceLevel {
    /// Previous month high (`PMH`), long breakout on the bid.
    PreviousHigh,
    /// Previous month low (`PML`), short breakout on the ask.
    PreviousLow,
}

impl ReferenceLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PMH" => Some(ReferenceLevel::PreviousHigh),
            "PML" => Some(ReferenceLevel::PreviousLow),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceLevel::PreviousHigh => write!(f, "PMH"),
            ReferenceLevel::PreviousLow => write!(f, "PML"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CachedRange {
    year: i32,
    month: u32,
    range: PeriodRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakoutTrigger {
    pub level: ReferenceLevel,
    pub duration_trading_days: u32,
    cached: Option<CachedRange>,
    triggered_at: Option<NaiveDateTime>,
    evaluations: u32,
    elapsed: Option<u32>,
}

impl BreakoutTrigger {
    pub fn new(level: ReferenceLevel, duration_trading_days: u32) -> Self {
        BreakoutTrigger {
            level,
            duration_trading_days,
            cached: None,
            triggered_at: None,
            evaluations: 0,
            elapsed: None,
        }
    }

    pub fn triggered_at(&self) -> Option<NaiveDateTime> {
        self.triggered_at
    }

    /// Trading days since the trigger, as of the last heartbeat.
    pub fn elapsed(&self) -> Option<u32> {
        self.elapsed
    }

    /// The previous month's range, fetched once per calendar month.
    fn reference(
        &mut self,
        ctx: &TriggerContext<'_>,
        broker: &dyn BrokerPort,
    ) -> Result<Option<PeriodRange>, TraderError> {
        let (year, month) = (ctx.now.year(), ctx.now.month());
        if let Some(c) = self.cached.filter(|c| c.year == year && c.month == month) {
            return Ok(Some(c.range));
        }
        let range = broker.previous_bar(&ctx.params.symbol, 1)?;
        match range {
            Some(range) => {
                tracing::debug!(
                    magic = ctx.magic,
                    high = range.high,
                    low = range.low,
                    "previous month range"
                );
                self.cached = Some(CachedRange { year, month, range });
            }
            None => tracing::warn!(
                magic = ctx.magic,
                symbol = %ctx.params.symbol,
                "no previous monthly bar"
            ),
        }
        Ok(range)
    }

    /// Inside the target month and past the open time of its first day.
    fn month_gate(ctx: &TriggerContext<'_>) -> bool {
        let today = ctx.now.date();
        if today.month() != ctx.params.month {
            return false;
        }
        today.day() > 1 || ctx.params.open_time.is_none_or(|t| ctx.now.time() >= t)
    }

    pub fn decide(
        &mut self,
        ctx: &TriggerContext<'_>,
        broker: &dyn BrokerPort,
    ) -> Result<Option<Action>, TraderError> {
        match ctx.status {
            Status::Init => self.decide_open(ctx, broker),
            Status::Open => self.decide_close(ctx, broker),
            Status::Close => Ok(None),
        }
    }

    fn decide_open(
        &mut self,
        ctx: &TriggerContext<'_>,
        broker: &dyn BrokerPort,
    ) -> Result<Option<Action>, TraderError> {
        if !Self::month_gate(ctx) {
            return Ok(None);
        }
        let Some(range) = self.reference(ctx, broker)? else {
            return Ok(None);
        };
        let info = broker
            .symbol_info(&ctx.params.symbol)?
            .ok_or_else(|| TraderError::UnknownSymbol {
                symbol: ctx.params.symbol.clone(),
            })?;
        let broken = match self.level {
            ReferenceLevel::PreviousHigh => info.bid > range.high,
            ReferenceLevel::PreviousLow => info.ask < range.low,
        };
        if !broken {
            return Ok(None);
        }
        tracing::info!(
            magic = ctx.magic,
            level = %self.level,
            bid = info.bid,
            ask = info.ask,
            "breakout triggered"
        );
        self.triggered_at = Some(ctx.now);
        Ok(Some(Action::Open))
    }

    fn decide_close(
        &mut self,
        ctx: &TriggerContext<'_>,
        broker: &dyn BrokerPort,
    ) -> Result<Option<Action>, TraderError> {
        let triggered_at = *self
            .triggered_at
            .get_or_insert(ctx.opened_at.unwrap_or(ctx.now));

        self.evaluations = self.evaluations.wrapping_add(1);
        let heartbeat = ctx.settings.heartbeat.max(1);
        if self.elapsed.is_none() || self.evaluations % heartbeat == 0 {
            let today = ctx.now.date();
            let elapsed = match triggered_at.date().succ_opt() {
                Some(from) if from <= today => {
                    let bars = broker.daily_bars(&ctx.params.symbol, from, today)?;
                    count_trading_days(&bars, from, today)
                }
                _ => 0,
            };
            tracing::info!(
                magic = ctx.magic,
                elapsed,
                duration = self.duration_trading_days,
                "breakout holding"
            );
            self.elapsed = Some(elapsed);
        }

        let done = self.elapsed.is_some_and(|e| e > self.duration_trading_days);
        Ok((done && ctx.now > triggered_at).then_some(Action::Close))
    }

    /// Called once the position is confirmed open.
    pub fn confirm_open(&mut self, at: NaiveDateTime) {
        self.triggered_at.get_or_insert(at);
        self.evaluations = 0;
        self.elapsed = None;
    }
}
