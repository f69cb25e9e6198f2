use std::path::PathBuf;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

use super::parse_message;
use crate::models::MarketEvent;

/// Replay a file of recorded combined-stream messages, one JSON object per line
///
/// Events are stamped with the exchange event time. Blank lines are skipped,
/// unparseable lines are logged and skipped. Returns the number of events sent.
pub async fn run(path: PathBuf, tx: Sender<MarketEvent>) -> anyhow::Result<usize> {
    let file = File::open(&path)
        .await
        .with_context(|| format!("failed to open replay file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut line_no = 0usize;
    let mut sent = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        match parse_message(&line, None) {
            Ok(Some(event)) => {
                if tx.send(event).await.is_err() {
                    break;
                }
                sent += 1;
            }
            Ok(None) => {}
            Err(error) => warn!(line = line_no, %error, "Skipping unparseable line"),
        }
    }

    info!(path = %path.display(), lines = line_no, events = sent, "Replay finished");
    Ok(sent)
}
