//! Broker terminal port trait.
//!
//! Read queries take `&self`; anything that changes terminal state takes
//! `&mut self`. Every call is synchronous and blocks the scheduling loop.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::error::TraderError;
use crate::domain::market::{AccountSnapshot, DailyBar, DealInfo, PeriodRange, PositionInfo, SymbolInfo};
use crate::domain::order::{OrderCheck, OrderRequest, OrderResult};

pub trait BrokerPort {
    fn connect(&mut self) -> Result<(), TraderError>;

    fn disconnect(&mut self);

    fn account_snapshot(&self) -> Result<AccountSnapshot, TraderError>;

    /// `None` when the broker does not know the symbol.
    fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, TraderError>;

    /// Make the symbol visible in the terminal before trading it.
    fn select_symbol(&mut self, symbol: &str) -> Result<(), TraderError>;

    /// Daily bars with dates in `from..=to`.
    fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, TraderError>;

    /// High/low of the monthly bar `periods_back` months before the current one.
    fn previous_bar(
        &self,
        symbol: &str,
        periods_back: u32,
    ) -> Result<Option<PeriodRange>, TraderError>;

    fn open_positions(&self, symbol: &str) -> Result<Vec<PositionInfo>, TraderError>;

    fn history_deals(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<DealInfo>, TraderError>;

    fn check_order(&self, request: &OrderRequest) -> Result<OrderCheck, TraderError>;

    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderResult, TraderError>;

    /// `true` when the position was closed.
    fn close_position(&mut self, symbol: &str, ticket: u64) -> Result<bool, TraderError>;
}

/// A connected terminal. Disconnects when dropped, on every exit path.
pub struct BrokerSession<'a> {
    broker: &'a mut dyn BrokerPort,
}

impl<'a> BrokerSession<'a> {
    pub fn open(broker: &'a mut dyn BrokerPort) -> Result<Self, TraderError> {
        broker.connect()?;
        Ok(Self { broker })
    }

    pub fn broker(&self) -> &(dyn BrokerPort + 'a) {
        &*self.broker
    }

    pub fn broker_mut(&mut self) -> &mut (dyn BrokerPort + 'a) {
        &mut *self.broker
    }
}

impl Drop for BrokerSession<'_> {
    fn drop(&mut self) {
        self.broker.disconnect();
    }
}
