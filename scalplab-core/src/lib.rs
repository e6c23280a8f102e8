//! ScalpLab Core: signal-to-order decision engine for one futures pair.
//!
//! This crate contains everything one trading cycle needs:
//! - Domain types (candles, pairs, instruments, order instructions)
//! - Indicator engine (EMA, RSI, ATR) over a candle snapshot
//! - Entry rule on the last two closed bars
//! - Fixed-fractional risk sizer
//! - Bracket plan builder and ordered submission
//! - Exchange collaborator trait with paper and Bitget adapters
//! - Orchestrator driving one snapshot-decide-act cycle

pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod orchestrator;
pub mod orders;
pub mod signal;
pub mod sizer;

pub use config::{BotConfig, ConfigError};
pub use error::{EngineError, Severity};
pub use orchestrator::{NoActionReason, Orchestrator, Outcome};
