//! Exchange collaborator seam.
//!
//! The `Exchange` trait is everything the decision engine consumes from a
//! venue. Calls are synchronous and strictly sequential from the engine's
//! point of view. Implementations own transport, auth and precision metadata.

pub mod bitget;
pub mod error;
pub mod paper;

pub use bitget::{BitgetExchange, Credentials, VenueConfig};
pub use error::ExchangeError;
pub use paper::{ExchangeCall, PaperExchange};

use crate::domain::{
    Balance, Candle, Instrument, MarginMode, OrderAck, OrderInstruction, Pair, Position, Timeframe,
};
use std::ops::{Deref, DerefMut};
use tracing::warn;

pub trait Exchange {
    /// Venue name for logs.
    fn name(&self) -> &str;

    /// Load contract metadata (precision, minimum sizes).
    fn load_market_metadata(&mut self) -> Result<(), ExchangeError>;

    /// Precision rules for `pair`. Requires `load_market_metadata` first.
    fn instrument(&self, pair: &Pair) -> Result<Instrument, ExchangeError>;

    fn configure_margin(
        &mut self,
        pair: &Pair,
        mode: MarginMode,
        leverage: u32,
    ) -> Result<(), ExchangeError>;

    /// Newest-last candles, at most `limit` of them.
    fn fetch_ohlcv(
        &mut self,
        pair: &Pair,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    fn cancel_conditional_orders(&mut self, pair: &Pair) -> Result<(), ExchangeError>;

    fn cancel_open_orders(&mut self, pair: &Pair) -> Result<(), ExchangeError>;

    fn fetch_open_positions(&mut self, pairs: &[Pair]) -> Result<Vec<Position>, ExchangeError>;

    fn fetch_balance(&mut self) -> Result<Balance, ExchangeError>;

    fn round_size(&self, pair: &Pair, size: f64) -> Result<f64, ExchangeError> {
        Ok(self.instrument(pair)?.round_size(size))
    }

    fn round_price(&self, pair: &Pair, price: f64) -> Result<f64, ExchangeError> {
        Ok(self.instrument(pair)?.round_price(price))
    }

    /// Submit an immediately-live order.
    fn submit_order(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
        margin_mode: MarginMode,
    ) -> Result<OrderAck, ExchangeError>;

    /// Submit an order that activates once `order.trigger_price` is reached.
    fn submit_trigger_order(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
        margin_mode: MarginMode,
    ) -> Result<OrderAck, ExchangeError>;

    /// Release connection/session resources.
    fn close(&mut self) -> Result<(), ExchangeError>;
}

impl<E: Exchange + ?Sized> Exchange for &mut E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load_market_metadata(&mut self) -> Result<(), ExchangeError> {
        (**self).load_market_metadata()
    }

    fn instrument(&self, pair: &Pair) -> Result<Instrument, ExchangeError> {
        (**self).instrument(pair)
    }

    fn configure_margin(
        &mut self,
        pair: &Pair,
        mode: MarginMode,
        leverage: u32,
    ) -> Result<(), ExchangeError> {
        (**self).configure_margin(pair, mode, leverage)
    }

    fn fetch_ohlcv(
        &mut self,
        pair: &Pair,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        (**self).fetch_ohlcv(pair, timeframe, limit)
    }

    fn cancel_conditional_orders(&mut self, pair: &Pair) -> Result<(), ExchangeError> {
        (**self).cancel_conditional_orders(pair)
    }

    fn cancel_open_orders(&mut self, pair: &Pair) -> Result<(), ExchangeError> {
        (**self).cancel_open_orders(pair)
    }

    fn fetch_open_positions(&mut self, pairs: &[Pair]) -> Result<Vec<Position>, ExchangeError> {
        (**self).fetch_open_positions(pairs)
    }

    fn fetch_balance(&mut self) -> Result<Balance, ExchangeError> {
        (**self).fetch_balance()
    }

    fn round_size(&self, pair: &Pair, size: f64) -> Result<f64, ExchangeError> {
        (**self).round_size(pair, size)
    }

    fn round_price(&self, pair: &Pair, price: f64) -> Result<f64, ExchangeError> {
        (**self).round_price(pair, price)
    }

    fn submit_order(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
        margin_mode: MarginMode,
    ) -> Result<OrderAck, ExchangeError> {
        (**self).submit_order(pair, order, margin_mode)
    }

    fn submit_trigger_order(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
        margin_mode: MarginMode,
    ) -> Result<OrderAck, ExchangeError> {
        (**self).submit_trigger_order(pair, order, margin_mode)
    }

    fn close(&mut self) -> Result<(), ExchangeError> {
        (**self).close()
    }
}

/// Scoped exchange session: `close()` runs on every exit path.
///
/// Call [`ExchangeSession::close`] to observe the close result; otherwise the
/// drop guard closes the session and logs any failure.
pub struct ExchangeSession<E: Exchange> {
    inner: E,
    closed: bool,
}

impl<E: Exchange> ExchangeSession<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    pub fn close(mut self) -> Result<(), ExchangeError> {
        self.closed = true;
        self.inner.close()
    }
}

impl<E: Exchange> Deref for ExchangeSession<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.inner
    }
}

impl<E: Exchange> DerefMut for ExchangeSession<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.inner
    }
}

impl<E: Exchange> Drop for ExchangeSession<E> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(err) = self.inner.close() {
                warn!(venue = self.inner.name(), %err, "closing exchange session failed");
            }
        }
    }
}
