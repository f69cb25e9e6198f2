// Core modules
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod strategy;

// Re-export commonly used types
pub use config::{AppConfig, EngineConfig};
pub use engine::{CycleOutcome, MicroPulseEngine};
pub use error::EngineError;
pub use models::*;
