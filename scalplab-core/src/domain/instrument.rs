use super::market::Pair;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Venue precision rules for one pair: price tick, size lot, minimum size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub pair: Pair,
    pub tick_size: f64,
    pub lot_size: f64,
    pub min_size: f64,
}

impl Instrument {
    pub fn new(
        pair: Pair,
        tick_size: f64,
        lot_size: f64,
        min_size: f64,
    ) -> Result<Self, InstrumentError> {
        if !(tick_size > 0.0 && tick_size.is_finite()) {
            return Err(InstrumentError::InvalidTickSize { tick_size });
        }
        if !(lot_size > 0.0 && lot_size.is_finite()) {
            return Err(InstrumentError::InvalidLotSize { lot_size });
        }
        if !(min_size >= 0.0 && min_size.is_finite()) {
            return Err(InstrumentError::InvalidMinSize { min_size });
        }
        Ok(Self { pair, tick_size, lot_size, min_size })
    }

    /// Build from the decimal-place counts most venues publish
    /// (`pricePlace = 1` → tick 0.1).
    pub fn from_places(
        pair: Pair,
        price_places: u32,
        size_places: u32,
        min_size: f64,
    ) -> Result<Self, InstrumentError> {
        let tick = 1.0 / 10f64.powi(price_places as i32);
        let lot = 1.0 / 10f64.powi(size_places as i32);
        Self::new(pair, tick, lot, min_size)
    }

    /// Round a price to the nearest tick.
    pub fn round_price(&self, price: f64) -> f64 {
        let ticks = (price / self.tick_size).round();
        round_dp(ticks * self.tick_size, decimals_of(self.tick_size))
    }

    /// Round a price UP to the next tick, leaving tick-aligned prices alone.
    ///
    /// Used for long stops: moving the stop toward entry only shrinks the
    /// loss at the stop.
    pub fn round_price_up(&self, price: f64) -> f64 {
        let ticks = (price / self.tick_size - 1e-9).ceil();
        round_dp(ticks * self.tick_size, decimals_of(self.tick_size))
    }

    /// Round a size DOWN to a whole number of lots (never increases risk).
    pub fn round_size(&self, size: f64) -> f64 {
        if !size.is_finite() || size <= 0.0 {
            return 0.0;
        }
        // Tolerance absorbs representation error such as 125 / 0.001 = 124999.99999999999.
        let lots = (size / self.lot_size + 1e-9).floor();
        round_dp(lots * self.lot_size, decimals_of(self.lot_size))
    }

    /// Price as a decimal string with exactly the venue's price precision.
    pub fn format_price(&self, price: f64) -> String {
        format!("{:.*}", decimals_of(self.tick_size) as usize, self.round_price(price))
    }

    /// Size as a decimal string with exactly the venue's size precision.
    pub fn format_size(&self, size: f64) -> String {
        format!("{:.*}", decimals_of(self.lot_size) as usize, self.round_size(size))
    }

    /// True if `size` is tradable: positive and at least `min_size`.
    pub fn is_tradable_size(&self, size: f64) -> bool {
        size > 0.0 && size + 1e-12 >= self.min_size
    }
}

/// Number of decimal places needed to represent `step` exactly (capped at 12).
fn decimals_of(step: f64) -> i32 {
    for d in 0..=12 {
        let scaled = step * 10f64.powi(d);
        if (scaled - scaled.round()).abs() < 1e-9 {
            return d;
        }
    }
    12
}

fn round_dp(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Error, PartialEq)]
pub enum InstrumentError {
    #[error("tick_size must be positive and finite, got {tick_size}")]
    InvalidTickSize { tick_size: f64 },

    #[error("lot_size must be positive and finite, got {lot_size}")]
    InvalidLotSize { lot_size: f64 },

    #[error("min_size must be non-negative and finite, got {min_size}")]
    InvalidMinSize { min_size: f64 },
}
