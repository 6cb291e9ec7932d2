//! Paper broker: a simulated terminal for dry runs.
//!
//! Quotes and contract specs come from `[symbol.<NAME>]` config sections,
//! daily bars from `<bars_dir>/<SYMBOL>.csv`. Orders fill in full at the
//! requested price; positions and deals live in memory only.

use std::fs;
use std::path::PathBuf;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::domain::config_validation::{symbol_info, symbol_names};
use crate::domain::error::TraderError;
use crate::domain::market::{
    AccountSnapshot, DailyBar, DealInfo, PeriodRange, PositionInfo, SymbolInfo, month_bounds,
};
use crate::domain::order::{FillingMode, OrderCheck, OrderRequest, OrderResult};
use crate::domain::retcode;
use crate::ports::broker_port::BrokerPort;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Deserialize)]
struct BarRecord {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    tick_volume: u64,
}

#[derive(Debug, Clone)]
struct PaperPosition {
    info: PositionInfo,
    volume: f64,
}

pub struct PaperBroker {
    account: AccountSnapshot,
    symbols: Vec<SymbolInfo>,
    bars_dir: Option<PathBuf>,
    fillings: Vec<FillingMode>,
    positions: Vec<PaperPosition>,
    deals: Vec<DealInfo>,
    next_ticket: u64,
    connected: bool,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn parse_filling(value: &str) -> Option<FillingMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "fok" => Some(FillingMode::FillOrKill),
        "ioc" => Some(FillingMode::ImmediateOrCancel),
        "return" => Some(FillingMode::Return),
        _ => None,
    }
}

impl PaperBroker {
    pub fn new(account: AccountSnapshot, symbols: Vec<SymbolInfo>) -> Self {
        PaperBroker {
            account,
            symbols,
            bars_dir: None,
            fillings: FillingMode::ALL.to_vec(),
            positions: Vec::new(),
            deals: Vec::new(),
            next_ticket: 1,
            connected: false,
            clock: local_now,
        }
    }

    /// Build from the `[paper]` and `[symbol.*]` sections.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let equity = config.get_double("paper", "equity", 10_000.0);
        let balance = config.get_double("paper", "balance", equity);
        let symbols = symbol_names(config)
            .iter()
            .map(|name| symbol_info(config, name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut broker = PaperBroker::new(AccountSnapshot { equity, balance }, symbols);
        broker.bars_dir = config
            .get_string("paper", "bars_dir")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        if let Some(raw) = config.get_string("paper", "filling") {
            broker.fillings = raw
                .split(',')
                .map(|m| {
                    parse_filling(m).ok_or_else(|| TraderError::ConfigInvalid {
                        section: "paper".to_string(),
                        key: "filling".to_string(),
                        reason: format!("{:?} is not one of fok, ioc, return", m.trim()),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
        }
        Ok(broker)
    }

    pub fn with_bars_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bars_dir = Some(dir.into());
        self
    }

    pub fn with_fillings(mut self, fillings: Vec<FillingMode>) -> Self {
        self.fillings = fillings;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn ensure_connected(&self) -> Result<(), TraderError> {
        if self.connected {
            Ok(())
        } else {
            Err(TraderError::connection("paper terminal is not connected"))
        }
    }

    fn symbol(&self, name: &str) -> Option<&SymbolInfo> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Retcode the request would fail with, if any.
    fn reject_reason(&self, request: &OrderRequest) -> Option<u32> {
        let Some(info) = self.symbol(&request.symbol) else {
            return Some(retcode::INVALID);
        };
        if !self.fillings.contains(&request.filling) {
            return Some(retcode::INVALID_FILL);
        }
        if request.volume < info.volume_min {
            return Some(retcode::INVALID_VOLUME);
        }
        None
    }

    fn read_bars(&self, symbol: &str) -> Result<Vec<DailyBar>, TraderError> {
        let Some(dir) = &self.bars_dir else {
            return Ok(Vec::new());
        };
        let path = dir.join(format!("{symbol}.csv"));
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no bar file");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(TraderError::Source {
                    reason: format!("failed to read {}: {e}", path.display()),
                });
            }
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for record in rdr.deserialize::<BarRecord>() {
            let record = record.map_err(|e| TraderError::Source {
                reason: format!("{}: {e}", path.display()),
            })?;
            let date = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d").map_err(|e| {
                TraderError::Source {
                    reason: format!("{}: invalid date {:?}: {e}", path.display(), record.date),
                }
            })?;
            bars.push(DailyBar {
                date,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                tick_volume: record.tick_volume,
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl BrokerPort for PaperBroker {
    fn connect(&mut self) -> Result<(), TraderError> {
        self.connected = true;
        tracing::debug!("paper terminal connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        tracing::debug!("paper terminal disconnected");
    }

    fn account_snapshot(&self) -> Result<AccountSnapshot, TraderError> {
        self.ensure_connected()?;
        Ok(self.account)
    }

    fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, TraderError> {
        self.ensure_connected()?;
        Ok(self.symbol(symbol).cloned())
    }

    fn select_symbol(&mut self, symbol: &str) -> Result<(), TraderError> {
        self.ensure_connected()?;
        if self.symbol(symbol).is_none() {
            return Err(TraderError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }
        Ok(())
    }

    fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>, TraderError> {
        self.ensure_connected()?;
        let mut bars = self.read_bars(symbol)?;
        bars.retain(|b| b.date >= from && b.date <= to);
        Ok(bars)
    }

    fn previous_bar(
        &self,
        symbol: &str,
        periods_back: u32,
    ) -> Result<Option<PeriodRange>, TraderError> {
        self.ensure_connected()?;
        let today = (self.clock)().date();
        let Some(target) = today
            .with_day(1)
            .and_then(|d| d.checked_sub_months(Months::new(periods_back)))
        else {
            return Ok(None);
        };
        let Some((first, last)) = month_bounds(target.year(), target.month()) else {
            return Ok(None);
        };
        let bars = self.daily_bars(symbol, first, last)?;
        Ok(bars.iter().fold(None, |acc: Option<PeriodRange>, b| {
            Some(match acc {
                None => PeriodRange {
                    high: b.high,
                    low: b.low,
                },
                Some(r) => PeriodRange {
                    high: r.high.max(b.high),
                    low: r.low.min(b.low),
                },
            })
        }))
    }

    fn open_positions(&self, symbol: &str) -> Result<Vec<PositionInfo>, TraderError> {
        self.ensure_connected()?;
        Ok(self
            .positions
            .iter()
            .filter(|p| p.info.symbol == symbol)
            .map(|p| p.info.clone())
            .collect())
    }

    fn history_deals(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<DealInfo>, TraderError> {
        self.ensure_connected()?;
        Ok(self
            .deals
            .iter()
            .filter(|d| d.time >= from && d.time <= to)
            .cloned()
            .collect())
    }

    fn check_order(&self, request: &OrderRequest) -> Result<OrderCheck, TraderError> {
        self.ensure_connected()?;
        Ok(match self.reject_reason(request) {
            Some(code) => OrderCheck {
                retcode: code,
                comment: retcode::describe(code).to_string(),
            },
            None => OrderCheck {
                retcode: 0,
                comment: "Done".to_string(),
            },
        })
    }

    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderResult, TraderError> {
        self.ensure_connected()?;
        if let Some(code) = self.reject_reason(request) {
            return Ok(OrderResult {
                retcode: code,
                ticket: 0,
                comment: retcode::describe(code).to_string(),
            });
        }
        let now = (self.clock)();
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.positions.push(PaperPosition {
            info: PositionInfo {
                ticket,
                magic: request.magic,
                symbol: request.symbol.clone(),
                opened_at: Some(now),
            },
            volume: request.volume,
        });
        self.deals.push(DealInfo {
            ticket,
            magic: request.magic,
            symbol: request.symbol.clone(),
            time: now,
        });
        tracing::info!(
            ticket,
            magic = request.magic,
            symbol = %request.symbol,
            side = ?request.side,
            volume = request.volume,
            price = request.price,
            "paper fill"
        );
        Ok(OrderResult {
            retcode: retcode::DONE,
            ticket,
            comment: retcode::describe(retcode::DONE).to_string(),
        })
    }

    fn close_position(&mut self, symbol: &str, ticket: u64) -> Result<bool, TraderError> {
        self.ensure_connected()?;
        let Some(index) = self
            .positions
            .iter()
            .position(|p| p.info.ticket == ticket && p.info.symbol == symbol)
        else {
            tracing::warn!(
                ticket,
                symbol,
                retcode = retcode::POSITION_CLOSED,
                "no such paper position"
            );
            return Ok(false);
        };
        let position = self.positions.remove(index);
        self.deals.push(DealInfo {
            ticket,
            magic: position.info.magic,
            symbol: position.info.symbol.clone(),
            time: (self.clock)(),
        });
        tracing::info!(
            ticket,
            magic = position.info.magic,
            symbol,
            volume = position.volume,
            "paper close"
        );
        Ok(true)
    }
}
