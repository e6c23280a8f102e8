//! Relative Strength Index with Wilder smoothing.
//!
//! `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`, defined from index
//! `period` (the first change exists at index 1). A window with no movement
//! reads 50; only gains reads 100; only losses reads 0.

use super::smoothing::{seeded_smooth, wilder_alpha};
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    /// A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut gains = vec![f64::NAN; candles.len()];
        let mut losses = vec![f64::NAN; candles.len()];
        for (i, w) in candles.windows(2).enumerate() {
            let change = w[1].close - w[0].close;
            if !change.is_nan() {
                gains[i + 1] = change.max(0.0);
                losses[i + 1] = (-change).max(0.0);
            }
        }

        let alpha = wilder_alpha(self.period);
        let avg_gain = seeded_smooth(&gains, self.period, alpha);
        let avg_loss = seeded_smooth(&losses, self.period, alpha);
        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| strength_index(g, l))
            .collect()
    }
}

fn strength_index(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        f64::NAN
    } else if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
