//! Order plan builder: one bracket (entry, stop-loss, take-profit) per
//! triggered decision, and the ordered submission of its legs.

pub mod bracket;

pub use bracket::{BracketPlan, SubmissionReport};
