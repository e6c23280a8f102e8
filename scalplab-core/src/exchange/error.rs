use thiserror::Error;

/// Faults raised by an exchange collaborator.
///
/// Displayable in CLI logs; every variant carries enough context to tell the
/// operator which call failed and why.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExchangeError {
    #[error("market metadata could not be loaded: {0}")]
    MarketLoad(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("venue error {code}: {msg}")]
    Api { code: String, msg: String },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unknown pair '{0}' (markets not loaded or not listed)")]
    UnknownPair(String),

    #[error("exchange session already closed")]
    Closed,
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExchangeError::Decode(err.to_string())
        } else {
            ExchangeError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Decode(err.to_string())
    }
}
