//! Fixed-fractional risk sizer.
//!
//! # Formula
//! ```text
//! risk_amount = capital * risk_fraction
//! size        = risk_amount / (entry - stop)
//! ```
//!
//! # Example
//! - Capital: 10,000
//! - Risk fraction: 5% (500)
//! - Entry 100, stop 96 (distance 4)
//! - Size: 500 / 4 = 125

use crate::domain::Instrument;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSizeResult {
    /// Size rounded down to the venue lot; always tradable.
    pub size: f64,
    /// Size before venue rounding.
    pub raw_size: f64,
    pub risk_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSizer {
    risk_fraction: f64,
}

impl RiskSizer {
    /// `risk_fraction` must lie in (0, 1]; config validation enforces it.
    pub fn new(risk_fraction: f64) -> Self {
        Self { risk_fraction }
    }

    pub fn risk_fraction(&self) -> f64 {
        self.risk_fraction
    }

    /// Unrounded size. Fails when the stop is not strictly below the entry.
    pub fn raw_size(&self, capital: f64, entry: f64, stop: f64) -> Result<f64, EngineError> {
        let distance = entry - stop;
        if !(distance > 0.0 && distance.is_finite() && entry.is_finite()) {
            return Err(EngineError::InvalidRiskGeometry { entry, stop });
        }
        Ok(capital * self.risk_fraction / distance)
    }

    pub fn size(
        &self,
        capital: f64,
        entry: f64,
        stop: f64,
        instrument: &Instrument,
    ) -> Result<PositionSizeResult, EngineError> {
        let raw_size = self.raw_size(capital, entry, stop)?;
        if !(capital > 0.0 && capital.is_finite()) {
            return Err(EngineError::SizeTooSmall {
                size: raw_size,
                min: instrument.min_size,
            });
        }
        let size = instrument.round_size(raw_size);
        if !instrument.is_tradable_size(size) {
            return Err(EngineError::SizeTooSmall {
                size,
                min: instrument.min_size.max(instrument.lot_size),
            });
        }
        Ok(PositionSizeResult {
            size,
            raw_size,
            risk_amount: capital * self.risk_fraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Pair;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use proptest::prelude::*;

    fn instrument(lot: f64, min: f64) -> Instrument {
        Instrument::new(Pair::new("BTC/USDT").unwrap(), 0.1, lot, min).unwrap()
    }

    #[test]
    fn five_percent_of_ten_thousand_over_four() {
        let sizer = RiskSizer::new(0.05);
        assert_approx(sizer.raw_size(10_000.0, 100.0, 96.0).unwrap(), 125.0, DEFAULT_EPSILON);
        let result = sizer.size(10_000.0, 100.0, 96.0, &instrument(0.001, 0.001)).unwrap();
        assert_approx(result.size, 125.0, DEFAULT_EPSILON);
        assert_approx(result.risk_amount, 500.0, DEFAULT_EPSILON);
    }

    #[test]
    fn stop_at_or_above_entry_is_invalid() {
        let sizer = RiskSizer::new(0.05);
        assert!(matches!(
            sizer.raw_size(10_000.0, 100.0, 100.0),
            Err(EngineError::InvalidRiskGeometry { .. })
        ));
        assert!(matches!(
            sizer.raw_size(10_000.0, 100.0, 101.0),
            Err(EngineError::InvalidRiskGeometry { .. })
        ));
        assert!(matches!(
            sizer.raw_size(10_000.0, 100.0, f64::NAN),
            Err(EngineError::InvalidRiskGeometry { .. })
        ));
    }

    #[test]
    fn rounds_down_to_lot() {
        // 500 / 3 = 166.666...
        let result = RiskSizer::new(0.05)
            .size(10_000.0, 100.0, 97.0, &instrument(0.01, 0.01))
            .unwrap();
        assert_approx(result.size, 166.66, 1e-9);
        assert!(result.size <= result.raw_size);
    }

    #[test]
    fn below_minimum_is_too_small() {
        let err = RiskSizer::new(0.05)
            .size(10.0, 50_000.0, 40_000.0, &instrument(0.001, 0.001))
            .unwrap_err();
        assert!(matches!(err, EngineError::SizeTooSmall { .. }));
    }

    #[test]
    fn rounds_to_zero_is_too_small() {
        let err = RiskSizer::new(0.05)
            .size(1.0, 100.0, 96.0, &instrument(1.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::SizeTooSmall { size, .. } if size == 0.0));
    }

    #[test]
    fn non_positive_capital_is_too_small() {
        let err = RiskSizer::new(0.05)
            .size(0.0, 100.0, 96.0, &instrument(0.001, 0.001))
            .unwrap_err();
        assert!(matches!(err, EngineError::SizeTooSmall { .. }));
    }

    proptest! {
        #[test]
        fn risk_at_stop_never_exceeds_budget(
            capital in 100.0f64..1_000_000.0,
            entry in 10.0f64..100_000.0,
            stop_frac in 0.001f64..0.5,
        ) {
            let stop = entry * (1.0 - stop_frac);
            let sizer = RiskSizer::new(0.05);
            if let Ok(result) = sizer.size(capital, entry, stop, &instrument(0.001, 0.001)) {
                let loss = result.size * (entry - stop);
                prop_assert!(loss <= result.risk_amount * (1.0 + 1e-9));
                prop_assert!(result.size > 0.0);
            }
        }
    }
}
