use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::OutputConfig;
use crate::engine::CycleOutcome;
use crate::execution::Transaction;
use crate::models::{BookSide, Timestamp, WindowStats};

/// One row per evaluated wall event, signal or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalAuditRow {
    pub timestamp: Timestamp,
    pub mid: f64,
    pub obi: f64,
    pub spike_up: f64,
    pub spike_down: f64,
    pub window_cvd: f64,
    pub cvd: f64,
    pub trade_count: usize,
    pub avg_trade_size: f64,
    pub wall_side: Option<BookSide>,
    pub wall_price: Option<f64>,
    pub wall_old_size: Option<f64>,
    pub wall_new_size: Option<f64>,
    pub wall_removed_ts: Option<Timestamp>,
    pub signal: String,
}

impl SignalAuditRow {
    pub fn new(stats: &WindowStats, outcome: &CycleOutcome) -> Self {
        let wall = outcome.evaluated_wall.as_ref();
        Self {
            timestamp: stats.timestamp,
            mid: stats.mid,
            obi: stats.obi,
            spike_up: stats.spike_up,
            spike_down: stats.spike_down,
            window_cvd: stats.window_cvd,
            cvd: stats.cvd,
            trade_count: stats.window_trade_count,
            avg_trade_size: stats.avg_trade_size,
            wall_side: wall.map(|w| w.side),
            wall_price: wall.map(|w| w.price),
            wall_old_size: wall.map(|w| w.old_size),
            wall_new_size: wall.map(|w| w.new_size),
            wall_removed_ts: wall.map(|w| w.removed_ts),
            signal: outcome
                .signal
                .map(|s| s.side.to_string())
                .unwrap_or_else(|| "none".to_string()),
        }
    }
}

/// Destination for the records the engine produces
pub trait RecordSink {
    fn record_transaction(&mut self, transaction: &Transaction) -> anyhow::Result<()>;

    fn record_audit(&mut self, row: &SignalAuditRow) -> anyhow::Result<()>;

    /// Make everything recorded so far durable
    fn flush(&mut self) -> anyhow::Result<()>;
}

/// Hand the records of one cycle to `sink`
///
/// Writes an audit row when a wall event was evaluated and one record per
/// closed transaction.
pub fn record_outcome(sink: &mut dyn RecordSink, outcome: &CycleOutcome) -> anyhow::Result<()> {
    if let (Some(stats), Some(_)) = (&outcome.stats, &outcome.evaluated_wall) {
        sink.record_audit(&SignalAuditRow::new(stats, outcome))?;
    }

    for transaction in &outcome.closed {
        sink.record_transaction(transaction)?;
    }

    Ok(())
}

/// Appends records as JSON lines
///
/// Transactions are flushed as soon as they are written; audit rows are
/// buffered until the next flush.
pub struct JsonlRecorder {
    transactions: BufWriter<File>,
    history: Option<BufWriter<File>>,
}

impl JsonlRecorder {
    pub fn open(transactions_path: &Path, history_path: Option<&Path>) -> anyhow::Result<Self> {
        let history = history_path.map(open_append).transpose()?;
        Ok(Self {
            transactions: open_append(transactions_path)?,
            history,
        })
    }

    pub fn from_config(config: &OutputConfig) -> anyhow::Result<Self> {
        let history_path = config
            .record_history
            .then(|| Path::new(&config.history_path));
        Self::open(Path::new(&config.transactions_path), history_path)
    }
}

fn open_append(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn write_line<T: Serialize>(writer: &mut BufWriter<File>, record: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    Ok(())
}

impl RecordSink for JsonlRecorder {
    fn record_transaction(&mut self, transaction: &Transaction) -> anyhow::Result<()> {
        write_line(&mut self.transactions, transaction)?;
        self.transactions.flush()?;
        Ok(())
    }

    fn record_audit(&mut self, row: &SignalAuditRow) -> anyhow::Result<()> {
        if let Some(history) = self.history.as_mut() {
            write_line(history, row)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.transactions.flush()?;
        if let Some(history) = self.history.as_mut() {
            history.flush()?;
        }
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    pub transactions: Vec<Transaction>,
    pub audit_rows: Vec<SignalAuditRow>,
}

impl RecordSink for MemoryRecorder {
    fn record_transaction(&mut self, transaction: &Transaction) -> anyhow::Result<()> {
        self.transactions.push(transaction.clone());
        Ok(())
    }

    fn record_audit(&mut self, row: &SignalAuditRow) -> anyhow::Result<()> {
        self.audit_rows.push(row.clone());
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
