use super::market::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV interval, keyed by the instant it opened.
///
/// Snapshots are ordered newest-last with strictly increasing `open_time`;
/// the newest one may still be forming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Any field missing (NaN).
    pub fn is_void(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .any(|v| v.is_nan())
    }

    /// Prices positive, open and close inside [low, high], volume non-negative.
    pub fn is_sane(&self) -> bool {
        let inside = |p: f64| p >= self.low && p <= self.high;
        !self.is_void()
            && self.low > 0.0
            && inside(self.open)
            && inside(self.close)
            && self.volume >= 0.0
    }

    pub fn close_time(&self, timeframe: Timeframe) -> DateTime<Utc> {
        self.open_time + timeframe.duration()
    }

    /// Closed once the whole interval has elapsed.
    pub fn is_closed_at(&self, timeframe: Timeframe, now: DateTime<Utc>) -> bool {
        self.close_time(timeframe) <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 12.5,
        }
    }

    #[test]
    fn well_formed_candle_is_sane() {
        assert!(candle(100.0, 105.0, 98.0, 103.0).is_sane());
        assert!(candle(100.0, 100.0, 100.0, 100.0).is_sane());
    }

    #[test]
    fn missing_field_is_void() {
        let c = candle(100.0, 105.0, 98.0, f64::NAN);
        assert!(c.is_void());
        assert!(!c.is_sane());
    }

    #[test]
    fn close_outside_range_is_not_sane() {
        assert!(!candle(100.0, 105.0, 98.0, 106.0).is_sane());
        assert!(!candle(100.0, 97.0, 98.0, 99.0).is_sane());
        assert!(!candle(0.0, 1.0, 0.0, 0.5).is_sane());
    }

    #[test]
    fn forming_until_interval_elapses() {
        let c = candle(100.0, 105.0, 98.0, 103.0);
        let at = |m| c.open_time + Duration::minutes(m);
        assert!(!c.is_closed_at(Timeframe::M5, at(4)));
        assert!(c.is_closed_at(Timeframe::M5, at(5)));
        assert!(!c.is_closed_at(Timeframe::H1, at(59)));
        assert_eq!(c.close_time(Timeframe::M15), at(15));
    }
}
