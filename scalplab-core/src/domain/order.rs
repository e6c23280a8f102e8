//! Order instructions, roles, and acknowledgements.

use super::market::Pair;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Market,
    Limit,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit => "limit",
        }
    }
}

/// Position of an instruction within a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderRole {
    Entry,
    StopLoss,
    TakeProfit,
}

impl OrderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderRole::Entry => "entry",
            OrderRole::StopLoss => "stop_loss",
            OrderRole::TakeProfit => "take_profit",
        }
    }
}

impl fmt::Display for OrderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic client order id.
///
/// Derived from pair + signal bar + role with BLAKE3, so re-running a cycle
/// on the same signal bar yields the same ids and the venue rejects the
/// duplicate instead of stacking a second bracket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(pub String);

impl ClientOrderId {
    pub const LEN: usize = 32;

    pub fn derive(pair: &Pair, signal_time: DateTime<Utc>, role: OrderRole) -> Self {
        let canonical = format!(
            "{}|{}|{}",
            pair.as_str(),
            signal_time.timestamp_millis(),
            role.as_str()
        );
        let hash = blake3::hash(canonical.as_bytes());
        let hex = hash.to_hex();
        Self(hex.as_str()[..Self::LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One leg of a bracket, venue-agnostic.
///
/// `price` is `None` for market execution; `trigger_price` is `None` for
/// orders that are live immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInstruction {
    pub role: OrderRole,
    pub side: Side,
    pub kind: OrderKind,
    pub price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub size: f64,
    pub reduce_only: bool,
    pub client_order_id: ClientOrderId,
}

impl OrderInstruction {
    pub fn is_trigger(&self) -> bool {
        self.trigger_price.is_some()
    }
}

/// Venue acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub client_order_id: Option<String>,
}
