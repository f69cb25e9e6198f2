// Position lifecycle module
pub mod position_manager;

pub use position_manager::{ExitReason, Position, PositionManager, SessionSummary, Transaction};
