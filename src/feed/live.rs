use anyhow::Context;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::Sender;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::parse_message;
use crate::models::{MarketEvent, Timestamp};

fn receive_clock() -> Timestamp {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Stream events from a Binance combined websocket into `tx`
///
/// Returns when the server closes the stream or the receiving side is gone.
/// Reconnecting is left to whoever supervises the process.
pub async fn run(url: String, tx: Sender<MarketEvent>) -> anyhow::Result<()> {
    let (ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", url))?;
    info!(%url, "WebSocket connected");

    let (mut write, mut read) = ws.split();

    while let Some(message) = read.next().await {
        let text = match message.context("websocket read failed")? {
            Message::Text(text) => text,
            Message::Ping(payload) => {
                write.send(Message::Pong(payload)).await?;
                continue;
            }
            Message::Close(frame) => {
                info!(?frame, "WebSocket closed by server");
                break;
            }
            _ => continue,
        };

        match parse_message(&text, Some(receive_clock())) {
            Ok(Some(event)) => {
                if tx.send(event).await.is_err() {
                    debug!("Event queue closed, stopping live feed");
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "Skipping unparseable message"),
        }
    }

    Ok(())
}
