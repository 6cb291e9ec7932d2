//! Short-term signals: open and close on the N-th trading day of a month.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::error::TraderError;
use crate::domain::market::{count_trading_days, month_bounds};
use crate::domain::signal::{Action, Status, TriggerContext};
use crate::ports::broker_port::BrokerPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ShortTermTrigger {
    pub start_trading_day: u32,
    pub end_trading_day: u32,
    elapsed: Option<u32>,
}

/// At least `threshold` trading days have passed and the time of day is past
/// `gate`, when one is set.
fn threshold_reached(elapsed: u32, threshold: u32, gate: Option<NaiveTime>, now: NaiveDateTime) -> bool {
    elapsed >= threshold && gate.is_none_or(|g| now.time() >= g)
}

/// Year of the target month a position opened at `anchor` belongs to.
fn anchor_year(month: u32, anchor: NaiveDateTime) -> i32 {
    if anchor.month() >= month {
        anchor.year()
    } else {
        anchor.year() - 1
    }
}

impl ShortTermTrigger {
    pub fn new(start_trading_day: u32, end_trading_day: u32) -> Self {
        ShortTermTrigger {
            start_trading_day,
            end_trading_day,
            elapsed: None,
        }
    }

    /// Trading days counted at the last evaluation.
    pub fn elapsed(&self) -> Option<u32> {
        self.elapsed
    }

    fn count(
        &mut self,
        ctx: &TriggerContext<'_>,
        broker: &dyn BrokerPort,
        first: NaiveDate,
        today: NaiveDate,
    ) -> Result<u32, TraderError> {
        let bars = broker.daily_bars(&ctx.params.symbol, first, today)?;
        let elapsed = count_trading_days(&bars, first, today);
        if self.elapsed != Some(elapsed) {
            tracing::debug!(magic = ctx.magic, elapsed, "trading days elapsed this month");
            self.elapsed = Some(elapsed);
        }
        Ok(elapsed)
    }

    pub fn decide(
        &mut self,
        ctx: &TriggerContext<'_>,
        broker: &dyn BrokerPort,
    ) -> Result<Option<Action>, TraderError> {
        let today = ctx.now.date();
        let month = ctx.params.month;
        match ctx.status {
            Status::Init => {
                if today.month() != month {
                    return Ok(None);
                }
                let Some((first, _)) = month_bounds(today.year(), month) else {
                    return Ok(None);
                };
                let elapsed = self.count(ctx, broker, first, today)?;
                let open = threshold_reached(elapsed, self.start_trading_day, ctx.params.open_time, ctx.now);
                Ok(open.then_some(Action::Open))
            }
            Status::Open => {
                let year = anchor_year(month, ctx.opened_at.unwrap_or(ctx.now));
                let Some((first, last)) = month_bounds(year, month) else {
                    return Ok(None);
                };
                if today > last {
                    tracing::info!(magic = ctx.magic, month, "target month ended, closing");
                    return Ok(Some(Action::Close));
                }
                let elapsed = self.count(ctx, broker, first, today)?;
                let close = threshold_reached(elapsed, self.end_trading_day, ctx.params.close_time, ctx.now);
                Ok(close.then_some(Action::Close))
            }
            Status::Close => Ok(None),
        }
    }
}
