//! Order gateway: turns intents into broker requests.

use std::collections::HashMap;

use crate::domain::error::TraderError;
use crate::domain::intent::{CloseIntent, Intent, OpenIntent};
use crate::domain::order::{FillingMode, OrderRequest, OrderResult, OrderSide};
use crate::domain::retcode;
use crate::ports::broker_port::BrokerPort;

/// What a successful dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Opened { ticket: u64 },
    Closed { ticket: u64 },
}

#[derive(Debug, Clone)]
pub struct OrderGateway {
    deviation: u32,
    comment: String,
    filling_modes: HashMap<String, FillingMode>,
}

impl OrderGateway {
    pub fn new(deviation: u32, comment: impl Into<String>) -> Self {
        OrderGateway {
            deviation,
            comment: comment.into(),
            filling_modes: HashMap::new(),
        }
    }

    /// Cached filling mode for `symbol`, if already resolved.
    pub fn filling_mode(&self, symbol: &str) -> Option<FillingMode> {
        self.filling_modes.get(symbol).copied()
    }

    /// First filling mode the broker accepts for a minimum-lot trial order at the
    /// ask, tried in FOK, IOC, RETURN order. Cached per symbol.
    pub fn resolve_filling_mode(
        &mut self,
        broker: &dyn BrokerPort,
        symbol: &str,
    ) -> Result<FillingMode, TraderError> {
        if let Some(mode) = self.filling_mode(symbol) {
            return Ok(mode);
        }
        let info = broker
            .symbol_info(symbol)?
            .ok_or_else(|| TraderError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        for mode in FillingMode::ALL {
            let trial = OrderRequest {
                symbol: symbol.to_string(),
                side: OrderSide::Buy,
                volume: info.volume_min,
                price: info.ask,
                stoploss: None,
                deviation: self.deviation,
                magic: 0,
                comment: self.comment.clone(),
                filling: mode,
            };
            let check = broker.check_order(&trial)?;
            if check.accepted() {
                tracing::debug!(symbol, filling = ?mode, code = mode.code(), "filling mode resolved");
                self.filling_modes.insert(symbol.to_string(), mode);
                return Ok(mode);
            }
            tracing::debug!(
                symbol,
                filling = ?mode,
                code = mode.code(),
                retcode = check.retcode,
                comment = %check.comment,
                "filling mode refused"
            );
        }
        Err(TraderError::UnsupportedFilling {
            symbol: symbol.to_string(),
        })
    }

    /// Send `intent` to the broker.
    pub fn execute(
        &mut self,
        broker: &mut dyn BrokerPort,
        intent: &Intent,
    ) -> Result<Execution, TraderError> {
        broker.select_symbol(intent.symbol())?;
        match intent {
            Intent::Open(open) => self.open(broker, open),
            Intent::Close(close) => Self::close(broker, close),
        }
    }

    fn open(
        &mut self,
        broker: &mut dyn BrokerPort,
        intent: &OpenIntent,
    ) -> Result<Execution, TraderError> {
        let filling = self.resolve_filling_mode(&*broker, &intent.symbol)?;
        let request = OrderRequest {
            symbol: intent.symbol.clone(),
            side: OrderSide::from(intent.direction),
            volume: intent.volume,
            price: intent.price,
            stoploss: Some(intent.stoploss_price),
            deviation: self.deviation,
            magic: intent.magic,
            comment: self.comment.clone(),
            filling,
        };
        let result = broker.submit_order(&request)?;
        check_result(&result)?;
        tracing::info!(
            magic = intent.magic,
            symbol = %intent.symbol,
            ticket = result.ticket,
            volume = intent.volume,
            price = intent.price,
            stoploss = intent.stoploss_price,
            "position opened"
        );
        Ok(Execution::Opened {
            ticket: result.ticket,
        })
    }

    fn close(broker: &mut dyn BrokerPort, intent: &CloseIntent) -> Result<Execution, TraderError> {
        if !broker.close_position(&intent.symbol, intent.ticket)? {
            return Err(TraderError::CloseRejected {
                symbol: intent.symbol.clone(),
                ticket: intent.ticket,
            });
        }
        tracing::info!(
            magic = intent.magic,
            symbol = %intent.symbol,
            ticket = intent.ticket,
            "position closed"
        );
        Ok(Execution::Closed {
            ticket: intent.ticket,
        })
    }
}

fn check_result(result: &OrderResult) -> Result<(), TraderError> {
    if result.is_done() {
        return Ok(());
    }
    if result.retcode == retcode::NO_CONNECTION {
        return Err(TraderError::connection(retcode::describe(result.retcode)));
    }
    Err(TraderError::ServerStatus {
        code: result.retcode,
        description: retcode::describe(result.retcode).to_string(),
    })
}
