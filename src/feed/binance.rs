use serde::Deserialize;

use super::FeedError;
use crate::models::{BookUpdate, Level, MarketEvent, Timestamp, TradeUpdate};

#[derive(Debug, Deserialize)]
struct Envelope {
    data: StreamEvent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
enum StreamEvent {
    #[serde(rename = "depthUpdate")]
    Depth(Depth),
    #[serde(rename = "trade")]
    Trade(Trade),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Depth {
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "b")]
    bids: Vec<(String, String)>,
    #[serde(rename = "a")]
    asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct Trade {
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "q")]
    quantity: String,
    #[serde(rename = "m")]
    buyer_is_maker: bool,
    #[serde(rename = "X")]
    order_type: Option<String>,
}

/// Parse one combined-stream message into a market event
///
/// `recv_ts` stamps the event with the local receive clock; without it the
/// exchange event time is used. Returns `Ok(None)` for messages the core
/// does not consume (non-market trades, other event types).
pub fn parse_message(text: &str, recv_ts: Option<Timestamp>) -> Result<Option<MarketEvent>, FeedError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    match envelope.data {
        StreamEvent::Depth(depth) => Ok(Some(MarketEvent::Book(BookUpdate {
            timestamp: recv_ts.unwrap_or_else(|| millis_to_secs(depth.event_time)),
            bids: parse_levels(&depth.bids)?,
            asks: parse_levels(&depth.asks)?,
        }))),
        StreamEvent::Trade(trade) => {
            if trade.order_type.as_deref() != Some("MARKET") {
                return Ok(None);
            }
            Ok(Some(MarketEvent::Trade(TradeUpdate {
                timestamp: recv_ts.unwrap_or_else(|| millis_to_secs(trade.event_time)),
                quantity: parse_f64(&trade.quantity)?,
                buyer_is_maker: trade.buyer_is_maker,
            })))
        }
        StreamEvent::Other => Ok(None),
    }
}

fn millis_to_secs(millis: i64) -> Timestamp {
    millis as f64 / 1000.0
}

fn parse_f64(raw: &str) -> Result<f64, FeedError> {
    raw.parse::<f64>()
        .map_err(|_| FeedError::Format(format!("not a number: {:?}", raw)))
}

fn parse_levels(raw: &[(String, String)]) -> Result<Vec<Level>, FeedError> {
    raw.iter()
        .map(|(price, size)| Ok(Level::new(parse_f64(price)?, parse_f64(size)?)))
        .collect()
}
