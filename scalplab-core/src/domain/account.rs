use super::market::Pair;
use serde::{Deserialize, Serialize};

/// Account equity in the quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub total: f64,
    pub available: f64,
}

/// Open exposure reported by the venue. Only its presence gates new entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pair: Pair,
    pub size: f64,
    pub entry_price: f64,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.size.abs() > 0.0
    }
}
