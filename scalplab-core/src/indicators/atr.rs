//! Average True Range with Wilder smoothing.
//!
//! The first candle has no previous close, so its true range is left
//! undefined and the series is defined from index `period`.

use super::smoothing::{seeded_smooth, wilder_alpha};
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    /// A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// `max(high - low, |high - prev_close|, |low - prev_close|)`; NaN at index 0.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; candles.len()];
    for (i, w) in candles.windows(2).enumerate() {
        let (prev_close, c) = (w[0].close, &w[1]);
        tr[i + 1] = (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs());
    }
    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        seeded_smooth(&true_range(candles), self.period, wilder_alpha(self.period))
    }
}
