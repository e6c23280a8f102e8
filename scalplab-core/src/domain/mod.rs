//! Domain types for ScalpLab

pub mod account;
pub mod candle;
pub mod instrument;
pub mod market;
pub mod order;

pub use account::{Balance, Position};
pub use candle::Candle;
pub use instrument::{Instrument, InstrumentError};
pub use market::{MarginMode, Pair, PairError, Timeframe, TimeframeError};
pub use order::{ClientOrderId, OrderAck, OrderInstruction, OrderKind, OrderRole, Side};
