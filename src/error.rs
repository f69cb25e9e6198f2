use crate::models::Timestamp;
use thiserror::Error;

/// Errors surfaced by the indicator, signal and position core.
///
/// Anything not listed here has an explicit saturating default (OBI on an
/// empty book, trade stats on an empty window) and never fails.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid book update: {0}")]
    InvalidBook(String),
    #[error("invalid trade quantity: {0}")]
    InvalidTrade(f64),
    #[error("division by zero: spike baseline mid is zero")]
    DivisionByZero,
    #[error("position already open at entry timestamp {0}")]
    DuplicatePosition(Timestamp),
    #[error("no open position at entry timestamp {0}")]
    PositionNotFound(Timestamp),
}
