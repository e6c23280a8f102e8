//! In-memory paper exchange.
//!
//! Holds a fixed candle snapshot, one instrument, a balance and positions.
//! Market entries fill immediately at the last close; trigger orders rest
//! until cancelled. Every call is recorded so tests can assert on ordering
//! and call counts, and rejections can be injected per order role.

use super::{Exchange, ExchangeError};
use crate::domain::{
    Balance, Candle, Instrument, MarginMode, OrderAck, OrderInstruction, OrderKind, OrderRole,
    Pair, Position, Side, Timeframe,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeCall {
    LoadMarketMetadata,
    ConfigureMargin {
        pair: Pair,
        mode: MarginMode,
        leverage: u32,
    },
    FetchOhlcv {
        pair: Pair,
        timeframe: Timeframe,
        limit: usize,
    },
    CancelConditionalOrders(Pair),
    CancelOpenOrders(Pair),
    FetchOpenPositions(Vec<Pair>),
    FetchBalance,
    SubmitOrder(OrderInstruction),
    SubmitTriggerOrder(OrderInstruction),
    Close,
}

/// A resting order held by the paper venue.
#[derive(Debug, Clone, PartialEq)]
pub struct RestingOrder {
    pub order_id: String,
    pub instruction: OrderInstruction,
}

#[derive(Debug)]
pub struct PaperExchange {
    instrument: Instrument,
    candles: Vec<Candle>,
    balance: Balance,
    positions: Vec<Position>,
    open_orders: Vec<RestingOrder>,
    trigger_orders: Vec<RestingOrder>,
    seen_client_ids: HashSet<String>,
    rejections: HashMap<OrderRole, String>,
    market_load_failure: Option<String>,
    markets_loaded: bool,
    closed: bool,
    next_order_id: u64,
    calls: Vec<ExchangeCall>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    open_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl PaperExchange {
    pub fn new(instrument: Instrument, candles: Vec<Candle>, balance: Balance) -> Self {
        Self {
            instrument,
            candles,
            balance,
            positions: Vec::new(),
            open_orders: Vec::new(),
            trigger_orders: Vec::new(),
            seen_client_ids: HashSet::new(),
            rejections: HashMap::new(),
            market_load_failure: None,
            markets_loaded: false,
            closed: false,
            next_order_id: 1,
            calls: Vec::new(),
        }
    }

    /// Load candles from CSV with columns `open_time,open,high,low,close,volume`.
    ///
    /// `open_time` is either epoch milliseconds or RFC 3339.
    pub fn from_csv(
        path: &Path,
        instrument: Instrument,
        balance: Balance,
    ) -> Result<Self, ExchangeError> {
        let file = std::fs::File::open(path)
            .map_err(|e| ExchangeError::Decode(format!("open {}: {e}", path.display())))?;
        let candles = read_candles(file)?;
        Ok(Self::new(instrument, candles, balance))
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.push(position);
        self
    }

    pub fn with_open_order(mut self, instruction: OrderInstruction) -> Self {
        let order_id = self.next_id();
        self.open_orders.push(RestingOrder { order_id, instruction });
        self
    }

    pub fn with_trigger_order(mut self, instruction: OrderInstruction) -> Self {
        let order_id = self.next_id();
        self.trigger_orders.push(RestingOrder { order_id, instruction });
        self
    }

    /// Reject every submission for `role` with `reason`.
    pub fn reject(mut self, role: OrderRole, reason: impl Into<String>) -> Self {
        self.rejections.insert(role, reason.into());
        self
    }

    pub fn fail_market_load(mut self, reason: impl Into<String>) -> Self {
        self.market_load_failure = Some(reason.into());
        self
    }

    pub fn calls(&self) -> &[ExchangeCall] {
        &self.calls
    }

    pub fn submit_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ExchangeCall::SubmitOrder(_)))
            .count()
    }

    pub fn trigger_submit_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ExchangeCall::SubmitTriggerOrder(_)))
            .count()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn open_orders(&self) -> &[RestingOrder] {
        &self.open_orders
    }

    pub fn trigger_orders(&self) -> &[RestingOrder] {
        &self.trigger_orders
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn next_id(&mut self) -> String {
        let id = format!("paper-{}", self.next_order_id);
        self.next_order_id += 1;
        id
    }

    fn ensure_open(&self) -> Result<(), ExchangeError> {
        if self.closed {
            Err(ExchangeError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_pair(&self, pair: &Pair) -> Result<(), ExchangeError> {
        if pair == &self.instrument.pair {
            Ok(())
        } else {
            Err(ExchangeError::UnknownPair(pair.to_string()))
        }
    }

    fn has_position(&self, pair: &Pair) -> bool {
        self.positions.iter().any(|p| &p.pair == pair && p.is_open())
    }

    /// Checks shared by both submission paths; returns the assigned order id.
    fn pre_submit(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
    ) -> Result<String, ExchangeError> {
        self.ensure_open()?;
        self.ensure_pair(pair)?;
        if let Some(reason) = self.rejections.get(&order.role) {
            return Err(ExchangeError::OrderRejected {
                reason: reason.clone(),
            });
        }
        if self.seen_client_ids.contains(&order.client_order_id.0) {
            return Err(ExchangeError::OrderRejected {
                reason: format!("duplicate client order id {}", order.client_order_id),
            });
        }
        if order.reduce_only && !self.has_position(pair) {
            return Err(ExchangeError::OrderRejected {
                reason: "reduce-only order requires an open position".into(),
            });
        }
        if order.size.is_nan() || order.size <= 0.0 {
            return Err(ExchangeError::OrderRejected {
                reason: format!("size must be positive, got {}", order.size),
            });
        }
        self.seen_client_ids.insert(order.client_order_id.0.clone());
        Ok(self.next_id())
    }

    fn fill_market(&mut self, pair: &Pair, order: &OrderInstruction) -> Result<(), ExchangeError> {
        let price = self
            .candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| ExchangeError::OrderRejected {
                reason: "no market price available".into(),
            })?;
        let signed = match order.side {
            Side::Buy => order.size,
            Side::Sell => -order.size,
        };
        match self.positions.iter_mut().find(|p| &p.pair == pair) {
            Some(pos) => {
                let new_size = pos.size + signed;
                if new_size.abs() > 0.0 && pos.size.signum() == signed.signum() {
                    pos.entry_price =
                        (pos.entry_price * pos.size.abs() + price * order.size) / new_size.abs();
                }
                pos.size = new_size;
            }
            None => self.positions.push(Position {
                pair: pair.clone(),
                size: signed,
                entry_price: price,
            }),
        }
        self.positions.retain(|p| p.is_open());
        Ok(())
    }
}

/// Parse candle CSV from any reader.
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>, ExchangeError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut candles: Vec<Candle> = Vec::new();
    for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| ExchangeError::Decode(format!("candle row {}: {e}", line + 1)))?;
        let open_time = parse_open_time(&row.open_time)
            .map_err(|e| ExchangeError::Decode(format!("candle row {}: {e}", line + 1)))?;
        if let Some(prev) = candles.last() {
            if open_time <= prev.open_time {
                return Err(ExchangeError::Decode(format!(
                    "candle row {}: open_time {open_time} is not after {}",
                    line + 1,
                    prev.open_time
                )));
            }
        }
        let candle = Candle {
            open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !candle.is_sane() {
            return Err(ExchangeError::Decode(format!(
                "candle row {}: inconsistent OHLCV values",
                line + 1
            )));
        }
        candles.push(candle);
    }
    Ok(candles)
}

fn parse_open_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| format!("timestamp {ms} out of range"));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid open_time '{raw}': {e}"))
}

impl Exchange for PaperExchange {
    fn name(&self) -> &str {
        "paper"
    }

    fn load_market_metadata(&mut self) -> Result<(), ExchangeError> {
        self.calls.push(ExchangeCall::LoadMarketMetadata);
        self.ensure_open()?;
        if let Some(reason) = &self.market_load_failure {
            return Err(ExchangeError::MarketLoad(reason.clone()));
        }
        self.markets_loaded = true;
        Ok(())
    }

    fn instrument(&self, pair: &Pair) -> Result<Instrument, ExchangeError> {
        if !self.markets_loaded {
            return Err(ExchangeError::UnknownPair(pair.to_string()));
        }
        self.ensure_pair(pair)?;
        Ok(self.instrument.clone())
    }

    fn configure_margin(
        &mut self,
        pair: &Pair,
        mode: MarginMode,
        leverage: u32,
    ) -> Result<(), ExchangeError> {
        self.calls.push(ExchangeCall::ConfigureMargin {
            pair: pair.clone(),
            mode,
            leverage,
        });
        self.ensure_open()?;
        self.ensure_pair(pair)
    }

    fn fetch_ohlcv(
        &mut self,
        pair: &Pair,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.calls.push(ExchangeCall::FetchOhlcv {
            pair: pair.clone(),
            timeframe,
            limit,
        });
        self.ensure_open()?;
        self.ensure_pair(pair)?;
        let start = self.candles.len().saturating_sub(limit);
        Ok(self.candles[start..].to_vec())
    }

    fn cancel_conditional_orders(&mut self, pair: &Pair) -> Result<(), ExchangeError> {
        self.calls.push(ExchangeCall::CancelConditionalOrders(pair.clone()));
        self.ensure_open()?;
        let before = self.trigger_orders.len();
        self.trigger_orders.clear();
        debug!(cancelled = before, "paper: trigger orders cancelled");
        Ok(())
    }

    fn cancel_open_orders(&mut self, pair: &Pair) -> Result<(), ExchangeError> {
        self.calls.push(ExchangeCall::CancelOpenOrders(pair.clone()));
        self.ensure_open()?;
        let before = self.open_orders.len();
        self.open_orders.clear();
        debug!(cancelled = before, "paper: open orders cancelled");
        Ok(())
    }

    fn fetch_open_positions(&mut self, pairs: &[Pair]) -> Result<Vec<Position>, ExchangeError> {
        self.calls.push(ExchangeCall::FetchOpenPositions(pairs.to_vec()));
        self.ensure_open()?;
        Ok(self
            .positions
            .iter()
            .filter(|p| pairs.contains(&p.pair) && p.is_open())
            .cloned()
            .collect())
    }

    fn fetch_balance(&mut self) -> Result<Balance, ExchangeError> {
        self.calls.push(ExchangeCall::FetchBalance);
        self.ensure_open()?;
        Ok(self.balance)
    }

    fn submit_order(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
        _margin_mode: MarginMode,
    ) -> Result<OrderAck, ExchangeError> {
        self.calls.push(ExchangeCall::SubmitOrder(order.clone()));
        if order.trigger_price.is_some() {
            return Err(ExchangeError::OrderRejected {
                reason: "trigger orders must use the plan-order endpoint".into(),
            });
        }
        let order_id = self.pre_submit(pair, order)?;
        match order.kind {
            OrderKind::Market => self.fill_market(pair, order)?,
            OrderKind::Limit => self.open_orders.push(RestingOrder {
                order_id: order_id.clone(),
                instruction: order.clone(),
            }),
        }
        Ok(OrderAck {
            order_id,
            client_order_id: Some(order.client_order_id.0.clone()),
        })
    }

    fn submit_trigger_order(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
        _margin_mode: MarginMode,
    ) -> Result<OrderAck, ExchangeError> {
        self.calls.push(ExchangeCall::SubmitTriggerOrder(order.clone()));
        if order.trigger_price.is_none() {
            return Err(ExchangeError::OrderRejected {
                reason: "trigger order without trigger price".into(),
            });
        }
        if order.kind == OrderKind::Limit && order.price.is_none() {
            return Err(ExchangeError::OrderRejected {
                reason: "limit trigger order without limit price".into(),
            });
        }
        let order_id = self.pre_submit(pair, order)?;
        self.trigger_orders.push(RestingOrder {
            order_id: order_id.clone(),
            instruction: order.clone(),
        });
        Ok(OrderAck {
            order_id,
            client_order_id: Some(order.client_order_id.0.clone()),
        })
    }

    fn close(&mut self) -> Result<(), ExchangeError> {
        self.calls.push(ExchangeCall::Close);
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClientOrderId;
    use crate::indicators::make_candles;

    fn pair() -> Pair {
        Pair::new("BTC/USDT").unwrap()
    }

    fn exchange() -> PaperExchange {
        let inst = Instrument::new(pair(), 0.1, 0.001, 0.001).unwrap();
        let balance = Balance {
            total: 10_000.0,
            available: 10_000.0,
        };
        PaperExchange::new(inst, make_candles(&[100.0, 101.0, 102.0]), balance)
    }

    fn instruction(role: OrderRole, side: Side, reduce_only: bool, trigger: Option<f64>) -> OrderInstruction {
        OrderInstruction {
            role,
            side,
            kind: OrderKind::Market,
            price: None,
            trigger_price: trigger,
            size: 1.5,
            reduce_only,
            client_order_id: ClientOrderId(format!("{role}-{side:?}")),
        }
    }

    #[test]
    fn market_entry_fills_at_last_close() {
        let mut ex = exchange();
        ex.load_market_metadata().unwrap();
        let entry = instruction(OrderRole::Entry, Side::Buy, false, None);
        ex.submit_order(&pair(), &entry, MarginMode::Isolated).unwrap();
        let positions = ex.fetch_open_positions(&[pair()]).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].size, 1.5);
        assert_eq!(positions[0].entry_price, 102.0);
    }

    #[test]
    fn reduce_only_trigger_requires_position() {
        let mut ex = exchange();
        let stop = instruction(OrderRole::StopLoss, Side::Sell, true, Some(95.0));
        let err = ex
            .submit_trigger_order(&pair(), &stop, MarginMode::Isolated)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::OrderRejected { .. }));
        assert!(ex.trigger_orders().is_empty());
    }

    #[test]
    fn duplicate_client_id_is_rejected() {
        let mut ex = exchange();
        let entry = instruction(OrderRole::Entry, Side::Buy, false, None);
        ex.submit_order(&pair(), &entry, MarginMode::Isolated).unwrap();
        let err = ex.submit_order(&pair(), &entry, MarginMode::Isolated).unwrap_err();
        assert!(err.to_string().contains("duplicate client order id"));
        assert_eq!(ex.positions()[0].size, 1.5);
    }

    #[test]
    fn rejected_order_does_not_consume_its_client_id() {
        let mut ex = exchange();
        let stop = instruction(OrderRole::StopLoss, Side::Sell, true, Some(95.0));
        assert!(ex
            .submit_trigger_order(&pair(), &stop, MarginMode::Isolated)
            .is_err());

        let entry = instruction(OrderRole::Entry, Side::Buy, false, None);
        ex.submit_order(&pair(), &entry, MarginMode::Isolated).unwrap();
        ex.submit_trigger_order(&pair(), &stop, MarginMode::Isolated)
            .unwrap();
        assert_eq!(ex.trigger_orders().len(), 1);
    }

    #[test]
    fn injected_rejection_applies_to_role() {
        let mut ex = exchange().reject(OrderRole::Entry, "insufficient margin");
        let entry = instruction(OrderRole::Entry, Side::Buy, false, None);
        let err = ex.submit_order(&pair(), &entry, MarginMode::Isolated).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::OrderRejected {
                reason: "insufficient margin".into()
            }
        );
        assert!(ex.positions().is_empty());
    }

    #[test]
    fn cancels_clear_resting_orders() {
        let stop = instruction(OrderRole::StopLoss, Side::Sell, true, Some(95.0));
        let mut limit = instruction(OrderRole::TakeProfit, Side::Sell, true, None);
        limit.kind = OrderKind::Limit;
        limit.price = Some(110.0);
        let mut ex = exchange().with_trigger_order(stop).with_open_order(limit);
        assert_eq!(ex.trigger_orders().len(), 1);
        assert_eq!(ex.open_orders().len(), 1);
        ex.cancel_conditional_orders(&pair()).unwrap();
        ex.cancel_open_orders(&pair()).unwrap();
        assert!(ex.trigger_orders().is_empty());
        assert!(ex.open_orders().is_empty());
    }

    #[test]
    fn fetch_ohlcv_returns_newest_tail() {
        let mut ex = exchange();
        let candles = ex.fetch_ohlcv(&pair(), Timeframe::M5, 2).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 102.0);
    }

    #[test]
    fn instrument_requires_loaded_markets() {
        let mut ex = exchange();
        assert!(ex.instrument(&pair()).is_err());
        ex.load_market_metadata().unwrap();
        assert_eq!(ex.round_price(&pair(), 101.26).unwrap(), 101.3);
        assert_eq!(ex.round_size(&pair(), 0.0126).unwrap(), 0.012);
    }

    #[test]
    fn calls_fail_after_close() {
        let mut ex = exchange();
        ex.close().unwrap();
        assert!(ex.is_closed());
        assert_eq!(ex.fetch_balance().unwrap_err(), ExchangeError::Closed);
    }

    #[test]
    fn csv_accepts_millis_and_rfc3339() {
        let data = "open_time,open,high,low,close,volume\n\
                    1704067200000,100,101,99,100.5,3\n\
                    2024-01-01T00:05:00Z,100.5,102,100,101.5,4\n";
        let candles = read_candles(data.as_bytes()).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time.timestamp_millis(), 1_704_067_200_000);
        assert_eq!(candles[1].open_time.timestamp_millis(), 1_704_067_500_000);
    }

    #[test]
    fn csv_rejects_inconsistent_ohlc() {
        let data = "open_time,open,high,low,close,volume\n\
                    1704067200000,100,99,98,100.5,3\n";
        assert!(matches!(
            read_candles(data.as_bytes()),
            Err(ExchangeError::Decode(_))
        ));
    }

    #[test]
    fn csv_rejects_out_of_order_rows() {
        let data = "open_time,open,high,low,close,volume\n\
                    1704067500000,100,101,99,100.5,3\n\
                    1704067200000,100.5,102,100,101.5,4\n";
        let err = read_candles(data.as_bytes()).unwrap_err();
        assert!(matches!(err, ExchangeError::Decode(_)));
    }
}
