use crate::domain::{
    ClientOrderId, Instrument, MarginMode, OrderAck, OrderInstruction, OrderKind, OrderRole, Pair,
    Side,
};
use crate::error::{EngineError, ExitFailure};
use crate::exchange::Exchange;
use crate::signal::EntryDecision;
use crate::sizer::PositionSizeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Three linked instructions for one long position, in submission order.
///
/// # Invariants
/// - Built only from a triggered decision
/// - size > 0, stop < entry < target after venue rounding
/// - Client order ids derive from (pair, signal bar, role), so a rerun on
///   the same bar produces the same ids
#[derive(Debug, Clone, PartialEq)]
pub struct BracketPlan {
    pair: Pair,
    signal_time: DateTime<Utc>,
    entry: OrderInstruction,
    stop_loss: OrderInstruction,
    take_profit: OrderInstruction,
}

/// Acknowledgements for a fully submitted bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub entry: OrderAck,
    pub stop_loss: OrderAck,
    pub take_profit: OrderAck,
}

impl BracketPlan {
    pub fn build(
        pair: &Pair,
        decision: &EntryDecision,
        size: &PositionSizeResult,
        instrument: &Instrument,
    ) -> Result<Self, EngineError> {
        if !decision.triggered {
            return Err(EngineError::InvalidPlan(
                "decision did not trigger an entry".into(),
            ));
        }
        let qty = instrument.round_size(size.size);
        if !instrument.is_tradable_size(qty) {
            return Err(EngineError::SizeTooSmall {
                size: qty,
                min: instrument.min_size.max(instrument.lot_size),
            });
        }

        // Entry fills at market; its rounded reference only guards geometry.
        // The size was budgeted against the raw stop, so the stop may only
        // move toward entry.
        let entry_ref = instrument.round_price(decision.entry_price);
        let stop = instrument.round_price_up(decision.stop_price);
        let target = instrument.round_price(decision.target_price);
        if !(stop > 0.0 && stop < entry_ref) {
            return Err(EngineError::InvalidRiskGeometry {
                entry: entry_ref,
                stop,
            });
        }
        if !(target > entry_ref) {
            return Err(EngineError::InvalidPlan(format!(
                "target {target} is not above entry {entry_ref} after rounding"
            )));
        }

        let id = |role| ClientOrderId::derive(pair, decision.signal_time, role);
        Ok(Self {
            pair: pair.clone(),
            signal_time: decision.signal_time,
            entry: OrderInstruction {
                role: OrderRole::Entry,
                side: Side::Buy,
                kind: OrderKind::Market,
                price: None,
                trigger_price: None,
                size: qty,
                reduce_only: false,
                client_order_id: id(OrderRole::Entry),
            },
            stop_loss: OrderInstruction {
                role: OrderRole::StopLoss,
                side: Side::Sell,
                kind: OrderKind::Market,
                price: None,
                trigger_price: Some(stop),
                size: qty,
                reduce_only: true,
                client_order_id: id(OrderRole::StopLoss),
            },
            take_profit: OrderInstruction {
                role: OrderRole::TakeProfit,
                side: Side::Sell,
                kind: OrderKind::Limit,
                price: Some(target),
                trigger_price: Some(target),
                size: qty,
                reduce_only: true,
                client_order_id: id(OrderRole::TakeProfit),
            },
        })
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn signal_time(&self) -> DateTime<Utc> {
        self.signal_time
    }

    pub fn entry(&self) -> &OrderInstruction {
        &self.entry
    }

    pub fn stop_loss(&self) -> &OrderInstruction {
        &self.stop_loss
    }

    pub fn take_profit(&self) -> &OrderInstruction {
        &self.take_profit
    }

    /// Legs in submission order.
    pub fn instructions(&self) -> [&OrderInstruction; 3] {
        [&self.entry, &self.stop_loss, &self.take_profit]
    }

    /// Submit entry first, then both exit legs.
    ///
    /// A rejected entry aborts with no exit attempted. Once the entry is
    /// acknowledged nothing is rolled back: every exit leg is still
    /// attempted, and any failure yields `UnprotectedPosition`.
    pub fn submit(
        &self,
        exchange: &mut dyn Exchange,
        margin_mode: MarginMode,
    ) -> Result<SubmissionReport, EngineError> {
        let entry = exchange
            .submit_order(&self.pair, &self.entry, margin_mode)
            .map_err(EngineError::EntryRejected)?;
        info!(
            pair = %self.pair,
            order_id = %entry.order_id,
            size = self.entry.size,
            "entry acknowledged"
        );

        let mut submitted = Vec::with_capacity(2);
        let mut failures = Vec::new();
        for leg in [&self.stop_loss, &self.take_profit] {
            match exchange.submit_trigger_order(&self.pair, leg, margin_mode) {
                Ok(ack) => {
                    info!(
                        pair = %self.pair,
                        role = %leg.role,
                        order_id = %ack.order_id,
                        trigger = leg.trigger_price,
                        "exit leg acknowledged"
                    );
                    submitted.push((leg.role, ack));
                }
                Err(err) => failures.push(ExitFailure {
                    role: leg.role,
                    error: err,
                }),
            }
        }

        if !failures.is_empty() {
            let err = EngineError::UnprotectedPosition {
                entry,
                submitted,
                failures,
            };
            error!(pair = %self.pair, %err, "position left without automated exit");
            return Err(err);
        }

        let mut acks = submitted.into_iter().map(|(_, ack)| ack);
        match (acks.next(), acks.next()) {
            (Some(stop_loss), Some(take_profit)) => Ok(SubmissionReport {
                entry,
                stop_loss,
                take_profit,
            }),
            _ => Err(EngineError::InvalidPlan(
                "exit leg acknowledgements missing".into(),
            )),
        }
    }
}
