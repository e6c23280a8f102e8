//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Short history: a series shorter than a window never defines it
//! 2. No look-ahead: appending candles never changes earlier values
//! 3. Bracket geometry: every plan that builds has stop < entry < target
//!    and keeps the loss at its stop inside the risk budget
//! 4. Risk budget: the loss at the stop never exceeds the risked capital

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use scalplab_core::domain::{Candle, Instrument, OrderKind, OrderRole, Pair};
use scalplab_core::indicators::{Ema, Indicator, IndicatorFrame, IndicatorWindows};
use scalplab_core::orders::BracketPlan;
use scalplab_core::signal::EntryDecision;
use scalplab_core::sizer::RiskSizer;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(50.0..150.0_f64, min..max)
}

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..50_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn candles(closes: &[f64]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                open_time: base + Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 1.0,
            }
        })
        .collect()
}

fn instrument() -> Instrument {
    Instrument::new(Pair::new("BTC/USDT").unwrap(), 0.01, 0.001, 0.001).unwrap()
}

// ── 1. Short History ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn slow_trend_undefined_below_window(closes in arb_closes(1, 21)) {
        let values = Ema::new(21).compute(&candles(&closes));
        prop_assert_eq!(values.len(), closes.len());
        prop_assert!(values.iter().all(|v| v.is_nan()));
    }
}

// ── 2. No Look-Ahead ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn appending_candles_keeps_history(
        closes in arb_closes(25, 60),
        extra in arb_closes(1, 10),
    ) {
        let windows = IndicatorWindows::default();
        let short = IndicatorFrame::compute(&candles(&closes), &windows);
        let mut longer = closes.clone();
        longer.extend(&extra);
        let long = IndicatorFrame::compute(&candles(&longer), &windows);
        for i in 0..closes.len() {
            prop_assert_eq!(short.bar(i), long.bar(i));
        }
    }
}

// ── 3. Bracket Geometry ──────────────────────────────────────────────

proptest! {
    #[test]
    fn built_plans_are_well_formed(
        entry in arb_price(),
        atr_frac in 0.0001..0.05_f64,
        capital in 100.0..1_000_000.0_f64,
        tick in prop::sample::select(vec![0.01, 0.1, 0.5, 1.0]),
    ) {
        let atr = entry * atr_frac;
        let decision = EntryDecision {
            triggered: true,
            ema_cross: true,
            momentum_ok: true,
            signal_time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            entry_price: entry,
            stop_price: entry - 0.4 * atr,
            target_price: entry + 1.1 * atr,
            volatility: atr,
        };
        let inst = Instrument::new(Pair::new("BTC/USDT").unwrap(), tick, 0.001, 0.001).unwrap();
        let Ok(size) = RiskSizer::new(0.05).size(capital, entry, decision.stop_price, &inst) else {
            return Ok(());
        };
        if let Ok(plan) = BracketPlan::build(&inst.pair, &decision, &size, &inst) {
            let [e, s, t] = plan.instructions();
            prop_assert_eq!(e.role, OrderRole::Entry);
            prop_assert_eq!(s.role, OrderRole::StopLoss);
            prop_assert_eq!(t.role, OrderRole::TakeProfit);
            prop_assert_eq!(s.kind, OrderKind::Market);
            prop_assert_eq!(t.kind, OrderKind::Limit);
            let stop = s.trigger_price.unwrap();
            let target = t.trigger_price.unwrap();
            prop_assert!(stop < entry && entry < target);
            prop_assert_eq!(t.price, Some(target));
            prop_assert!(e.size > 0.0 && e.size == s.size && s.size == t.size);
            // the loss at the submitted trigger stays within the risk budget
            prop_assert!(e.size * (entry - stop) <= capital * 0.05 * (1.0 + 1e-6));
        }
    }
}

// ── 4. Risk Budget ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn loss_at_stop_within_budget(
        capital in 100.0..1_000_000.0_f64,
        fraction in 0.001..1.0_f64,
        entry in arb_price(),
        distance_frac in 0.001..0.5_f64,
    ) {
        let stop = entry * (1.0 - distance_frac);
        let sizer = RiskSizer::new(fraction);
        if let Ok(result) = sizer.size(capital, entry, stop, &instrument()) {
            prop_assert!(result.size <= result.raw_size);
            prop_assert!(result.size * (entry - stop) <= capital * fraction * (1.0 + 1e-9));
        }
    }
}
