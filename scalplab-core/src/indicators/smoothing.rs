//! Seeded exponential smoothing shared by every indicator in the frame.
//!
//! All three indicators are the same recursion with a different weight:
//! seed with the plain mean of the first `period` consecutive defined
//! values, then `s[t] = alpha * x[t] + (1 - alpha) * s[t-1]`.

/// Weight of the standard EMA: `2 / (period + 1)`.
pub fn ema_alpha(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// Weight of Wilder's smoothing: `1 / period`.
pub fn wilder_alpha(period: usize) -> f64 {
    1.0 / period as f64
}

/// Smooth `values` in place of a fresh NaN-filled series.
///
/// The seed lands on the last index of the first run of `period` defined
/// values. A NaN after the seed leaves every later value undefined.
pub fn seeded_smooth(values: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let Some(seed_idx) = first_defined_run(values, period) else {
        return out;
    };
    let window = &values[seed_idx + 1 - period..=seed_idx];
    let mut level = window.iter().sum::<f64>() / period as f64;
    out[seed_idx] = level;

    for (slot, &x) in out[seed_idx + 1..].iter_mut().zip(&values[seed_idx + 1..]) {
        if x.is_nan() {
            break;
        }
        level = alpha * x + (1.0 - alpha) * level;
        *slot = level;
    }
    out
}

/// Index closing the first run of `period` consecutive non-NaN values.
fn first_defined_run(values: &[f64], period: usize) -> Option<usize> {
    let mut run = 0;
    values.iter().position(|v| {
        run = if v.is_nan() { 0 } else { run + 1 };
        run == period
    })
}
