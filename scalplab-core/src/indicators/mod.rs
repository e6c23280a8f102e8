//! Indicator engine.
//!
//! Indicators are pure functions: candle history in, numeric series out,
//! aligned index-for-index with the input. Undefined ("not yet warmed up")
//! values are `f64::NAN`.

pub mod atr;
pub mod ema;
pub mod frame;
pub mod rsi;
pub mod smoothing;

pub use atr::Atr;
pub use ema::Ema;
pub use frame::{BarReference, IndicatorFrame, IndicatorWindows};
pub use rsi::Rsi;

use crate::domain::Candle;

/// Trait for indicators.
///
/// # Look-ahead contamination guard
/// No value at index t may depend on candles after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_8", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces a defined value.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole series.
    ///
    /// Returns a `Vec<f64>` of the same length as `candles`; the first
    /// `lookback()` values are `f64::NAN`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Synthetic 5-minute candles from close prices.
///
/// open = previous close (or close for the first candle),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    let ohlc: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect();
    make_ohlc_candles(&ohlc)
}

#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            open_time: base + chrono::Duration::minutes(5 * i as i64),
            open,
            high,
            low,
            close,
            volume: 10.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
