// Entry signal module
pub mod signals;

pub use signals::SignalEvaluator;
