//! In-memory broker used by unit tests.

use std::cell::Cell;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::error::TraderError;
use crate::domain::market::{AccountSnapshot, DailyBar, DealInfo, PeriodRange, PositionInfo, SymbolInfo};
use crate::domain::order::{FillingMode, OrderCheck, OrderRequest, OrderResult};
use crate::domain::retcode;
use crate::ports::broker_port::BrokerPort;

pub struct FakeBroker {
    pub account: AccountSnapshot,
    pub symbols: HashMap<String, SymbolInfo>,
    pub bars: HashMap<String, Vec<DailyBar>>,
    pub previous: HashMap<String, PeriodRange>,
    pub positions: Vec<PositionInfo>,
    pub deals: Vec<DealInfo>,
    pub fillings: Vec<FillingMode>,
    pub submit_retcode: u32,
    pub offline: bool,
    /// Symbols whose queries fail as if the terminal dropped the connection.
    pub unreachable: Vec<String>,
    pub submitted: Vec<OrderRequest>,
    pub closed: Vec<u64>,
    pub selected: Vec<String>,
    pub connects: u32,
    pub disconnects: u32,
    pub previous_calls: Cell<u32>,
    next_ticket: u64,
}

impl Default for FakeBroker {
    fn default() -> Self {
        FakeBroker {
            account: AccountSnapshot {
                equity: 10_000.0,
                balance: 10_000.0,
            },
            symbols: HashMap::new(),
            bars: HashMap::new(),
            previous: HashMap::new(),
            positions: Vec::new(),
            deals: Vec::new(),
            fillings: vec![FillingMode::FillOrKill],
            submit_retcode: retcode::DONE,
            offline: false,
            unreachable: Vec::new(),
            submitted: Vec::new(),
            closed: Vec::new(),
            selected: Vec::new(),
            connects: 0,
            disconnects: 0,
            previous_calls: Cell::new(0),
            next_ticket: 1000,
        }
    }
}

pub fn eurusd() -> SymbolInfo {
    SymbolInfo {
        name: "EURUSD".into(),
        point: 0.00001,
        digits: 5,
        ask: 1.10010,
        bid: 1.10000,
        volume_min: 0.01,
        tick_value: 1.0,
        tick_size: 0.00001,
    }
}

pub fn gbpusd() -> SymbolInfo {
    SymbolInfo {
        name: "GBPUSD".into(),
        ask: 1.27010,
        bid: 1.27000,
        ..eurusd()
    }
}

pub fn bar(date: NaiveDate, tick_volume: u64) -> DailyBar {
    DailyBar {
        date,
        open: 1.1,
        high: 1.2,
        low: 1.0,
        close: 1.15,
        tick_volume,
    }
}

impl FakeBroker {
    pub fn with_symbol(mut self, info: SymbolInfo) -> Self {
        self.symbols.insert(info.name.clone(), info);
        self
    }

    /// One bar with ticks for every weekday in `from..=to`.
    pub fn with_weekday_bars(mut self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Self {
        use chrono::Datelike;
        let bars = from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|d| {
                let ticks = if d.weekday().number_from_monday() <= 5 { 100 } else { 0 };
                bar(d, ticks)
            })
            .collect();
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn set_quote(&mut self, symbol: &str, bid: f64, ask: f64) {
        if let Some(info) = self.symbols.get_mut(symbol) {
            info.bid = bid;
            info.ask = ask;
        }
    }

    fn online(&self) -> Result<(), TraderError> {
        if self.offline {
            Err(TraderError::connection("terminal offline"))
        } else {
            Ok(())
        }
    }
}

impl BrokerPort for FakeBroker {
    fn connect(&mut self) -> Result<(), TraderError> {
        self.online()?;
        self.connects += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }

    fn account_snapshot(&self) -> Result<AccountSnapshot, TraderError> {
        self.online()?;
        Ok(self.account)
    }

    fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, TraderError> {
        self.online()?;
        if self.unreachable.iter().any(|s| s == symbol) {
            return Err(TraderError::connection(format!("{symbol} query timed out")));
        }
        Ok(self.symbols.get(symbol).cloned())
    }

    fn select_symbol(&mut self, symbol: &str) -> Result<(), TraderError> {
        self.online()?;
        self.selected.push(symbol.to_string());
        Ok(())
    }

    fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, TraderError> {
        self.online()?;
        Ok(self
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= from && b.date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn previous_bar(
        &self,
        symbol: &str,
        _periods_back: u32,
    ) -> Result<Option<PeriodRange>, TraderError> {
        self.online()?;
        self.previous_calls.set(self.previous_calls.get() + 1);
        Ok(self.previous.get(symbol).copied())
    }

    fn open_positions(&self, symbol: &str) -> Result<Vec<PositionInfo>, TraderError> {
        self.online()?;
        Ok(self
            .positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .cloned()
            .collect())
    }

    fn history_deals(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<DealInfo>, TraderError> {
        self.online()?;
        Ok(self
            .deals
            .iter()
            .filter(|d| d.time >= from && d.time <= to)
            .cloned()
            .collect())
    }

    fn check_order(&self, request: &OrderRequest) -> Result<OrderCheck, TraderError> {
        self.online()?;
        if self.fillings.contains(&request.filling) {
            Ok(OrderCheck {
                retcode: 0,
                comment: "Done".into(),
            })
        } else {
            Ok(OrderCheck {
                retcode: retcode::INVALID_FILL,
                comment: "Unsupported filling mode".into(),
            })
        }
    }

    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderResult, TraderError> {
        self.online()?;
        self.submitted.push(request.clone());
        if self.submit_retcode != retcode::DONE {
            return Ok(OrderResult {
                retcode: self.submit_retcode,
                ticket: 0,
                comment: retcode::describe(self.submit_retcode).into(),
            });
        }
        self.next_ticket += 1;
        Ok(OrderResult {
            retcode: retcode::DONE,
            ticket: self.next_ticket,
            comment: "Request completed".into(),
        })
    }

    fn close_position(&mut self, _symbol: &str, ticket: u64) -> Result<bool, TraderError> {
        self.online()?;
        if self.submit_retcode != retcode::DONE {
            return Ok(false);
        }
        self.positions.retain(|p| p.ticket != ticket);
        self.closed.push(ticket);
        Ok(true)
    }
}
