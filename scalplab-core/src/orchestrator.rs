//! One snapshot-decide-act cycle against an exchange.
//!
//! ```text
//! LoadMarketState → EvaluateSignal → CancelStaleOrders → FetchPositions
//!     → NoAction | BuildAndSubmitPlan
//! ```
//!
//! Exactly one of `NoAction` / `Submitted` is produced per successful run.
//! Insufficient history aborts before any order is touched. The cycle keeps
//! no state between runs; the exchange is the only source of truth.

use crate::config::BotConfig;
use crate::error::EngineError;
use crate::exchange::Exchange;
use crate::indicators::IndicatorFrame;
use crate::orders::{BracketPlan, SubmissionReport};
use crate::signal::{closed_len, select_bars, EntryDecision};
use crate::sizer::RiskSizer;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum NoActionReason {
    /// A position is already open for the pair.
    PositionOpen,
    /// The entry rule did not fire on the last closed bar.
    NoSignal(EntryDecision),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    NoAction(NoActionReason),
    Submitted(SubmissionReport),
}

pub struct Orchestrator {
    config: BotConfig,
    sizer: RiskSizer,
}

impl Orchestrator {
    pub fn new(config: BotConfig) -> Self {
        let sizer = RiskSizer::new(config.risk_fraction);
        Self { config, sizer }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn run(&self, exchange: &mut dyn Exchange) -> Result<Outcome, EngineError> {
        self.run_at(exchange, Utc::now())
    }

    /// Run one cycle treating `now` as the current time.
    pub fn run_at(
        &self,
        exchange: &mut dyn Exchange,
        now: DateTime<Utc>,
    ) -> Result<Outcome, EngineError> {
        let cfg = &self.config;
        info!(
            pair = %cfg.pair,
            timeframe = %cfg.timeframe,
            venue = exchange.name(),
            "execution started at {}",
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        let result = self.cycle(exchange, now);

        let finished = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        match &result {
            Ok(Outcome::Submitted(report)) => info!(
                entry = %report.entry.order_id,
                stop_loss = %report.stop_loss.order_id,
                take_profit = %report.take_profit.order_id,
                "execution finished at {finished}: bracket submitted"
            ),
            Ok(Outcome::NoAction(reason)) => {
                info!(?reason, "execution finished at {finished}: no action")
            }
            Err(err) => warn!(%err, "execution finished at {finished}: aborted"),
        }
        result
    }

    fn cycle(
        &self,
        exchange: &mut dyn Exchange,
        now: DateTime<Utc>,
    ) -> Result<Outcome, EngineError> {
        let cfg = &self.config;
        let pair = &cfg.pair;

        exchange.load_market_metadata()?;
        exchange.configure_margin(pair, cfg.margin_mode, cfg.leverage)?;

        let candles = exchange.fetch_ohlcv(pair, cfg.timeframe, cfg.candle_limit)?;
        let closed = closed_len(&candles, cfg.timeframe, now);
        debug!(
            fetched = candles.len(),
            closed,
            "snapshot loaded"
        );
        let frame = IndicatorFrame::compute(&candles, &cfg.indicators);
        let (prev, curr) = select_bars(&frame, closed)?;
        let decision = cfg.signal.evaluate(&prev, &curr);
        debug!(
            signal_time = %decision.signal_time,
            fast = curr.fast_ma,
            slow = curr.slow_ma,
            momentum = curr.momentum,
            volatility = curr.volatility,
            ema_cross = decision.ema_cross,
            momentum_ok = decision.momentum_ok,
            "signal evaluated"
        );

        exchange.cancel_conditional_orders(pair)?;
        exchange.cancel_open_orders(pair)?;

        let positions = exchange.fetch_open_positions(std::slice::from_ref(pair))?;
        if positions.iter().any(|p| &p.pair == pair && p.is_open()) {
            info!(%pair, "position already open, skipping entry");
            return Ok(Outcome::NoAction(NoActionReason::PositionOpen));
        }
        if !decision.triggered {
            info!(%pair, "no entry signal");
            return Ok(Outcome::NoAction(NoActionReason::NoSignal(decision)));
        }

        let instrument = exchange.instrument(pair)?;
        let balance = exchange.fetch_balance()?;
        let size = self.sizer.size(
            balance.total,
            decision.entry_price,
            decision.stop_price,
            &instrument,
        )?;
        info!(
            %pair,
            entry = decision.entry_price,
            stop = decision.stop_price,
            target = decision.target_price,
            size = size.size,
            capital = balance.total,
            "entry signal"
        );

        let plan = BracketPlan::build(pair, &decision, &size, &instrument)?;
        let report = plan.submit(exchange, cfg.margin_mode)?;
        Ok(Outcome::Submitted(report))
    }
}
