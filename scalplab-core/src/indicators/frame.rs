//! The four-series frame the entry rule reads: fast/slow trend, momentum,
//! volatility.

use super::{Atr, Ema, Indicator, Rsi};
use crate::domain::Candle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lookback windows for the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorWindows {
    pub fast: usize,
    pub slow: usize,
    pub momentum: usize,
    pub volatility: usize,
}

impl Default for IndicatorWindows {
    fn default() -> Self {
        Self {
            fast: 8,
            slow: 21,
            momentum: 14,
            volatility: 14,
        }
    }
}

impl IndicatorWindows {
    /// Index of the first candle at which every series is defined.
    pub fn first_defined_index(&self) -> usize {
        Ema::new(self.fast)
            .lookback()
            .max(Ema::new(self.slow).lookback())
            .max(Rsi::new(self.momentum).lookback())
            .max(Atr::new(self.volatility).lookback())
    }

    /// Closed candles required for a defined (prev, curr) pair.
    pub fn min_closed_candles(&self) -> usize {
        self.first_defined_index() + 2
    }
}

/// Indicator series aligned index-for-index with the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    open_times: Vec<DateTime<Utc>>,
    closes: Vec<f64>,
    pub fast_ma: Vec<f64>,
    pub slow_ma: Vec<f64>,
    pub momentum: Vec<f64>,
    pub volatility: Vec<f64>,
}

/// One candle joined with its indicator values, all defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarReference {
    pub open_time: DateTime<Utc>,
    pub close: f64,
    pub fast_ma: f64,
    pub slow_ma: f64,
    pub momentum: f64,
    pub volatility: f64,
}

impl IndicatorFrame {
    pub fn compute(candles: &[Candle], windows: &IndicatorWindows) -> Self {
        Self {
            open_times: candles.iter().map(|c| c.open_time).collect(),
            closes: candles.iter().map(|c| c.close).collect(),
            fast_ma: Ema::new(windows.fast).compute(candles),
            slow_ma: Ema::new(windows.slow).compute(candles),
            momentum: Rsi::new(windows.momentum).compute(candles),
            volatility: Atr::new(windows.volatility).compute(candles),
        }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// The bar at `index`, or `None` if out of range or any value is undefined.
    pub fn bar(&self, index: usize) -> Option<BarReference> {
        let bar = BarReference {
            open_time: *self.open_times.get(index)?,
            close: *self.closes.get(index)?,
            fast_ma: *self.fast_ma.get(index)?,
            slow_ma: *self.slow_ma.get(index)?,
            momentum: *self.momentum.get(index)?,
            volatility: *self.volatility.get(index)?,
        };
        let defined = [
            bar.close,
            bar.fast_ma,
            bar.slow_ma,
            bar.momentum,
            bar.volatility,
        ]
        .iter()
        .all(|v| v.is_finite());
        defined.then_some(bar)
    }
}
