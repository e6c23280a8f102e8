//! Entry rule: single-bar bullish EMA crossover inside a momentum band.
//!
//! The evaluator only ever sees the last two *closed* bars. A still-forming
//! candle at the end of the snapshot is cut off by [`closed_len`] before the
//! bars are selected.

use crate::domain::{Candle, Timeframe};
use crate::error::EngineError;
use crate::indicators::{BarReference, IndicatorFrame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds of the entry rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalRule {
    /// Exclusive lower bound of the momentum band.
    pub momentum_floor: f64,
    /// Exclusive upper bound of the momentum band.
    pub momentum_ceiling: f64,
    pub stop_atr_multiple: f64,
    pub target_atr_multiple: f64,
}

impl Default for SignalRule {
    fn default() -> Self {
        Self {
            momentum_floor: 50.0,
            momentum_ceiling: 70.0,
            stop_atr_multiple: 0.4,
            target_atr_multiple: 1.1,
        }
    }
}

/// Result of one evaluation. Always produced, triggered or not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryDecision {
    pub triggered: bool,
    pub ema_cross: bool,
    pub momentum_ok: bool,
    /// Open time of the bar the decision was taken on.
    pub signal_time: DateTime<Utc>,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub volatility: f64,
}

impl SignalRule {
    /// Fast trend strictly crosses above slow between `prev` and `curr`.
    pub fn ema_cross(prev: &BarReference, curr: &BarReference) -> bool {
        prev.fast_ma < prev.slow_ma && curr.fast_ma > curr.slow_ma
    }

    pub fn momentum_ok(&self, curr: &BarReference) -> bool {
        curr.momentum > self.momentum_floor && curr.momentum < self.momentum_ceiling
    }

    pub fn evaluate(&self, prev: &BarReference, curr: &BarReference) -> EntryDecision {
        let ema_cross = Self::ema_cross(prev, curr);
        let momentum_ok = self.momentum_ok(curr);
        EntryDecision {
            triggered: ema_cross && momentum_ok,
            ema_cross,
            momentum_ok,
            signal_time: curr.open_time,
            entry_price: curr.close,
            stop_price: curr.close - self.stop_atr_multiple * curr.volatility,
            target_price: curr.close + self.target_atr_multiple * curr.volatility,
            volatility: curr.volatility,
        }
    }
}

/// Number of leading candles that are closed at `now`.
///
/// Only the newest candle can still be forming, so at most one element is
/// dropped.
pub fn closed_len(candles: &[Candle], timeframe: Timeframe, now: DateTime<Utc>) -> usize {
    match candles.last() {
        Some(last) if !last.is_closed_at(timeframe, now) => candles.len() - 1,
        _ => candles.len(),
    }
}

/// The (prev, curr) pair: the last two closed bars of the frame.
pub fn select_bars(
    frame: &IndicatorFrame,
    closed_len: usize,
) -> Result<(BarReference, BarReference), EngineError> {
    let closed_len = closed_len.min(frame.len());
    if closed_len < 2 {
        return Err(EngineError::InsufficientData(format!(
            "{closed_len} closed candle(s), need at least 2"
        )));
    }
    let (prev_idx, curr_idx) = (closed_len - 2, closed_len - 1);
    let prev = frame.bar(prev_idx).ok_or_else(|| {
        EngineError::InsufficientData(format!(
            "indicators undefined at closed bar {prev_idx} of {closed_len}"
        ))
    })?;
    let curr = frame.bar(curr_idx).ok_or_else(|| {
        EngineError::InsufficientData(format!(
            "indicators undefined at closed bar {curr_idx} of {closed_len}"
        ))
    })?;
    Ok((prev, curr))
}
