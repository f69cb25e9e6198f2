use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch, fractional.
pub type Timestamp = f64;

/// A single price level of one book side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

impl Level {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// Order book snapshot, both sides ordered best-first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookUpdate {
    pub timestamp: Timestamp,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// A completed market execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeUpdate {
    pub timestamp: Timestamp,
    pub quantity: f64,
    pub buyer_is_maker: bool,
}

/// Everything the core consumes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MarketEvent {
    Book(BookUpdate),
    Trade(TradeUpdate),
}

impl MarketEvent {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            MarketEvent::Book(book) => book.timestamp,
            MarketEvent::Trade(trade) => trade.timestamp,
        }
    }
}

/// Taker side of a trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Buyer resting as maker means the taker sold.
    pub fn from_buyer_is_maker(buyer_is_maker: bool) -> Self {
        if buyer_is_maker {
            TradeSide::Sell
        } else {
            TradeSide::Buy
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => write!(f, "bid"),
            BookSide::Ask => write!(f, "ask"),
        }
    }
}

/// Position direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn from_quantity(signed_quantity: f64) -> Self {
        if signed_quantity > 0.0 {
            Direction::Long
        } else {
            Direction::Short
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Removal of a previously detected liquidity wall
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WallEvent {
    pub side: BookSide,
    pub price: f64,
    pub old_size: f64,
    pub new_size: f64,
    pub removed_ts: Timestamp,
}

/// Windowed indicator snapshot handed to the signal evaluator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowStats {
    pub timestamp: Timestamp,
    pub mid: f64,
    pub obi: f64,
    pub spike_up: f64,
    pub spike_down: f64,
    pub window_buy_qty: f64,
    pub window_sell_qty: f64,
    pub window_cvd: f64,
    pub cvd: f64,
    pub window_trade_count: usize,
    pub trades_per_sec: f64,
    pub avg_trade_size: f64,
    pub wall_event: Option<WallEvent>,
}

/// Entry decision emitted when a signal fires
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SignalEvent {
    pub side: Direction,
    pub entry_timestamp: Timestamp,
    pub entry_price: f64,
}
