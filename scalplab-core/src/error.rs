//! Error taxonomy for one snapshot-decide-act cycle.

use crate::domain::{OrderAck, OrderRole};
use crate::exchange::ExchangeError;
use thiserror::Error;

/// How bad a failed cycle is for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The cycle stopped before leaving any new exposure behind.
    Abort,
    /// Capital is at risk with no automated exit.
    Critical,
}

/// An exit leg that failed after the entry was acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitFailure {
    pub role: OrderRole,
    pub error: ExchangeError,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid risk geometry: stop {stop} is not below entry {entry}")]
    InvalidRiskGeometry { entry: f64, stop: f64 },

    #[error("position size {size} is below the minimum tradable size {min}")]
    SizeTooSmall { size: f64, min: f64 },

    #[error("invalid bracket plan: {0}")]
    InvalidPlan(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("entry order rejected, no exit orders submitted: {0}")]
    EntryRejected(#[source] ExchangeError),

    #[error(
        "UNPROTECTED POSITION: entry {} acknowledged but exit leg(s) failed: {}",
        .entry.order_id,
        describe_failures(.failures)
    )]
    UnprotectedPosition {
        entry: OrderAck,
        submitted: Vec<(OrderRole, OrderAck)>,
        failures: Vec<ExitFailure>,
    },
}

impl EngineError {
    pub fn severity(&self) -> Severity {
        match self {
            EngineError::UnprotectedPosition { .. } => Severity::Critical,
            _ => Severity::Abort,
        }
    }
}

fn describe_failures(failures: &[ExitFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.role, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
