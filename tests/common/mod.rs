#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use signal_trader::domain::error::TraderError;
use signal_trader::domain::market::{
    AccountSnapshot, DailyBar, DealInfo, PeriodRange, PositionInfo, SymbolInfo,
};
use signal_trader::domain::order::{FillingMode, OrderCheck, OrderRequest, OrderResult};
use signal_trader::domain::retcode;
pub use signal_trader::domain::signal_row::SignalRow;
use signal_trader::ports::broker_port::BrokerPort;
use signal_trader::ports::signal_source_port::SignalSourcePort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Broker state shared between a test and the boxed [`MockBroker`].
pub struct BrokerState {
    pub account: AccountSnapshot,
    pub symbols: HashMap<String, SymbolInfo>,
    pub bars: HashMap<String, Vec<DailyBar>>,
    pub previous: HashMap<String, PeriodRange>,
    pub positions: Vec<PositionInfo>,
    pub deals: Vec<DealInfo>,
    pub fillings: Vec<FillingMode>,
    /// Retcode returned by the next submissions.
    pub submit_retcode: u32,
    pub close_accepted: bool,
    pub offline: bool,
    /// Symbols whose queries fail as if the terminal dropped the connection.
    pub unreachable: Vec<String>,
    pub connected: bool,
    pub connects: u32,
    pub disconnects: u32,
    pub submitted: Vec<OrderRequest>,
    pub closed: Vec<u64>,
    pub next_ticket: u64,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            account: AccountSnapshot {
                equity: 10_000.0,
                balance: 10_000.0,
            },
            symbols: HashMap::new(),
            bars: HashMap::new(),
            previous: HashMap::new(),
            positions: Vec::new(),
            deals: Vec::new(),
            fillings: vec![FillingMode::ImmediateOrCancel],
            submit_retcode: retcode::DONE,
            close_accepted: true,
            offline: false,
            unreachable: Vec::new(),
            connected: false,
            connects: 0,
            disconnects: 0,
            submitted: Vec::new(),
            closed: Vec::new(),
            next_ticket: 5000,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockBroker {
    pub state: Rc<RefCell<BrokerState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(self, info: SymbolInfo) -> Self {
        self.state
            .borrow_mut()
            .symbols
            .insert(info.name.clone(), info);
        self
    }

    pub fn with_position(self, position: PositionInfo) -> Self {
        self.state.borrow_mut().positions.push(position);
        self
    }

    pub fn with_deal(self, deal: DealInfo) -> Self {
        self.state.borrow_mut().deals.push(deal);
        self
    }

    fn online(&self) -> Result<(), TraderError> {
        let state = self.state.borrow();
        if state.offline {
            return Err(TraderError::connection("terminal unreachable"));
        }
        if !state.connected {
            return Err(TraderError::connection("not connected"));
        }
        Ok(())
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self) -> Result<(), TraderError> {
        let mut state = self.state.borrow_mut();
        if state.offline {
            return Err(TraderError::connection("terminal unreachable"));
        }
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.disconnects += 1;
    }

    fn account_snapshot(&self) -> Result<AccountSnapshot, TraderError> {
        self.online()?;
        Ok(self.state.borrow().account)
    }

    fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, TraderError> {
        self.online()?;
        if self.state.borrow().unreachable.iter().any(|s| s == symbol) {
            return Err(TraderError::connection(format!("{symbol} query timed out")));
        }
        Ok(self.state.borrow().symbols.get(symbol).cloned())
    }

    fn select_symbol(&mut self, _symbol: &str) -> Result<(), TraderError> {
        self.online()
    }

    fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, TraderError> {
        self.online()?;
        Ok(self
            .state
            .borrow()
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
        Ok(self.state.borrow().previous.get(symbol).copied())
    }

    fn open_positions(&self, symbol: &str) -> Result<Vec<PositionInfo>, TraderError> {
        self.online()?;
        Ok(self
            .state
            .borrow()
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
            .state
            .borrow()
            .deals
            .iter()
            .filter(|d| d.time >= from && d.time <= to)
            .cloned()
            .collect())
    }

    fn check_order(&self, request: &OrderRequest) -> Result<OrderCheck, TraderError> {
        self.online()?;
        let accepted = self.state.borrow().fillings.contains(&request.filling);
        Ok(if accepted {
            OrderCheck {
                retcode: 0,
                comment: "Done".into(),
            }
        } else {
            OrderCheck {
                retcode: retcode::INVALID_FILL,
                comment: retcode::describe(retcode::INVALID_FILL).into(),
            }
        })
    }

    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderResult, TraderError> {
        self.online()?;
        let mut state = self.state.borrow_mut();
        state.submitted.push(request.clone());
        let code = state.submit_retcode;
        if code != retcode::DONE {
            return Ok(OrderResult {
                retcode: code,
                ticket: 0,
                comment: retcode::describe(code).into(),
            });
        }
        state.next_ticket += 1;
        Ok(OrderResult {
            retcode: code,
            ticket: state.next_ticket,
            comment: retcode::describe(code).into(),
        })
    }

    fn close_position(&mut self, _symbol: &str, ticket: u64) -> Result<bool, TraderError> {
        self.online()?;
        let mut state = self.state.borrow_mut();
        if !state.close_accepted {
            return Ok(false);
        }
        state.positions.retain(|p| p.ticket != ticket);
        state.closed.push(ticket);
        Ok(true)
    }
}

/// Signal source whose rows the test can swap between ticks.
#[derive(Clone, Default)]
pub struct MockSource {
    pub rows: Rc<RefCell<Vec<SignalRow>>>,
    pub failing: Rc<RefCell<bool>>,
}

impl MockSource {
    pub fn new(rows: Vec<SignalRow>) -> Self {
        Self {
            rows: Rc::new(RefCell::new(rows)),
            failing: Rc::new(RefCell::new(false)),
        }
    }

    pub fn set_rows(&self, rows: Vec<SignalRow>) {
        *self.rows.borrow_mut() = rows;
    }
}

impl SignalSourcePort for MockSource {
    fn load_rows(&self) -> Result<Vec<Result<SignalRow, TraderError>>, TraderError> {
        if *self.failing.borrow() {
            return Err(TraderError::Source {
                reason: "signal file locked".into(),
            });
        }
        Ok(self.rows.borrow().iter().cloned().map(Ok).collect())
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

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// Weekday bars with ticks, weekend bars without.
pub fn weekday_bars(from: NaiveDate, to: NaiveDate) -> Vec<DailyBar> {
    use chrono::Datelike;
    from.iter_days()
        .take_while(|d| *d <= to)
        .map(|date| DailyBar {
            date,
            open: 1.1,
            high: 1.2,
            low: 1.0,
            close: 1.15,
            tick_volume: if date.weekday().number_from_monday() <= 5 { 100 } else { 0 },
        })
        .collect()
}

pub fn seasonal_row(magic: i64, entry: &str, tp: &str) -> SignalRow {
    SignalRow {
        magic: magic.to_string(),
        month: "3".into(),
        symbol: "EURUSD".into(),
        entry: entry.into(),
        tp: tp.into(),
        sl: "1".into(),
        sl_type: "Percentage".into(),
        risk: "1".into(),
        direction: "Long".into(),
        kind: "Seasonal".into(),
        open_time: "10:00".into(),
        close_time: "18:00".into(),
    }
}

pub fn breakout_row(magic: i64, level: &str, duration: &str) -> SignalRow {
    SignalRow {
        entry: level.into(),
        tp: duration.into(),
        kind: "Breakout".into(),
        sl: "500".into(),
        sl_type: "Points".into(),
        open_time: String::new(),
        close_time: String::new(),
        ..seasonal_row(magic, "", "")
    }
}
