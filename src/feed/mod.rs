// Market data feed module
// Wire parsing plus the live and replay sources that fill the event queue

pub mod binance;
pub mod live;
pub mod replay;

use thiserror::Error;

pub use binance::parse_message;

/// Capacity of the single ordered queue between a feed source and the dispatcher
pub const EVENT_QUEUE_CAPACITY: usize = 4096;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("format error: {0}")]
    Format(String),
}
