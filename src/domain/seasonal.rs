//! Seasonal signals: open and close on fixed calendar dates.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::domain::signal::{Action, Status, TriggerContext};
use crate::domain::signal_row::SignalParams;

/// A day of the year written as `DD.MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayMonth {
    pub day: u32,
    pub month: u32,
}

impl DayMonth {
    /// Parse `DD.MM`. 29.02 is accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let (day, month) = value.trim().split_once('.')?;
        let day: u32 = day.trim().parse().ok()?;
        let month: u32 = month.trim().parse().ok()?;
        // 2000 is a leap year, so every real calendar day validates.
        NaiveDate::from_ymd_opt(2000, month, day)?;
        Some(DayMonth { day, month })
    }

    /// This day in `year` at `time`. 29.02 falls back to 28.02 outside leap
    /// years.
    pub fn at(&self, year: i32, time: NaiveTime) -> Option<NaiveDateTime> {
        (1..=self.day)
            .rev()
            .find_map(|d| NaiveDate::from_ymd_opt(year, self.month, d))
            .map(|date| date.and_time(time))
    }
}

/// Concrete open and close timestamps of one seasonal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonalWindow {
    pub open_at: NaiveDateTime,
    pub close_at: NaiveDateTime,
}

/// Compute the window that applies at `now`.
///
/// While waiting to open, the open date is taken in the current year and
/// rolled to next year once `now` is more than `grace` past it. Once open,
/// the window is anchored on the actual open time, or on the latest
/// occurrence of the open date when that is unknown. The close date is taken
/// in the open's year and rolled forward when it would precede the open.
pub fn seasonal_window(
    open_day: DayMonth,
    open_time: NaiveTime,
    close_day: DayMonth,
    close_time: NaiveTime,
    now: NaiveDateTime,
    status: Status,
    opened_at: Option<NaiveDateTime>,
    grace: TimeDelta,
) -> Option<SeasonalWindow> {
    let this_year = open_day.at(now.year(), open_time)?;
    let open_at = match (status, opened_at) {
        (Status::Init, _) => {
            if now > this_year + grace {
                open_day.at(now.year() + 1, open_time)?
            } else {
                this_year
            }
        }
        (_, Some(at)) => at,
        (_, None) => {
            if this_year > now {
                open_day.at(now.year() - 1, open_time)?
            } else {
                this_year
            }
        }
    };

    let mut close_at = close_day.at(open_at.year(), close_time)?;
    if close_at < open_at {
        close_at = close_day.at(open_at.year() + 1, close_time)?;
    }
    Some(SeasonalWindow { open_at, close_at })
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalTrigger {
    pub open_day: DayMonth,
    pub close_day: DayMonth,
    window: Option<SeasonalWindow>,
}

impl SeasonalTrigger {
    pub fn new(open_day: DayMonth, close_day: DayMonth) -> Self {
        SeasonalTrigger {
            open_day,
            close_day,
            window: None,
        }
    }

    pub fn recompute(
        &mut self,
        now: NaiveDateTime,
        status: Status,
        opened_at: Option<NaiveDateTime>,
        params: &SignalParams,
        grace: TimeDelta,
    ) -> Option<SeasonalWindow> {
        let (Some(open_time), Some(close_time)) = (params.open_time, params.close_time) else {
            self.window = None;
            return None;
        };
        let window = seasonal_window(
            self.open_day,
            open_time,
            self.close_day,
            close_time,
            now,
            status,
            opened_at,
            grace,
        );
        if window != self.window {
            if let Some(w) = window {
                tracing::debug!(
                    symbol = %params.symbol,
                    open_at = %w.open_at,
                    close_at = %w.close_at,
                    "seasonal window"
                );
            }
            self.window = window;
        }
        window
    }

    pub fn decide(&mut self, ctx: &TriggerContext<'_>) -> Option<Action> {
        let window = self.recompute(
            ctx.now,
            ctx.status,
            ctx.opened_at,
            ctx.params,
            ctx.settings.open_grace,
        )?;
        match ctx.status {
            Status::Init if ctx.now > window.open_at => Some(Action::Open),
            Status::Open if ctx.now > window.close_at => Some(Action::Close),
            _ => None,
        }
    }
}
