use serde::{Deserialize, Serialize};

use crate::config::ExitConfig;
use crate::error::EngineError;
use crate::models::{Direction, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TimeStop,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TimeStop => write!(f, "time_stop"),
        }
    }
}

/// Open position, identified by its entry timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_ts: Timestamp,
    pub entry_price: f64,
    pub quantity: f64, // Signed: positive long, negative short
}

impl Position {
    pub fn direction(&self) -> Direction {
        Direction::from_quantity(self.quantity)
    }

    /// Directional return against `mid`
    pub fn return_ratio(&self, mid: f64) -> f64 {
        self.direction().sign() * (mid - self.entry_price) / self.entry_price
    }
}

/// Closed trade record, never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub entry_ts: Timestamp,
    pub entry_price: f64,
    pub exit_ts: Timestamp,
    pub exit_price: f64,
    pub quantity: f64,
    pub side: Direction,
    pub pnl_ratio: f64,
    pub exit_reason: ExitReason,
}

/// Aggregate over the transaction log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_pnl_ratio: f64,
    pub avg_pnl_ratio: f64,
    pub open_positions: usize,
}

pub struct PositionManager {
    config: ExitConfig,
    positions: Vec<Position>,
    transactions: Vec<Transaction>,
}

impl PositionManager {
    pub fn new(config: ExitConfig) -> Self {
        Self {
            config,
            positions: Vec::new(),
            transactions: Vec::new(),
        }
    }

    /// Open a new position
    ///
    /// Entry timestamps are position keys, so a second open at the same
    /// timestamp is rejected.
    pub fn open(
        &mut self,
        timestamp: Timestamp,
        entry_price: f64,
        quantity: f64,
    ) -> Result<&Position, EngineError> {
        if self.get_position(timestamp).is_some() {
            return Err(EngineError::DuplicatePosition(timestamp));
        }

        let index = self.positions.len();
        self.positions.push(Position {
            entry_ts: timestamp,
            entry_price,
            quantity,
        });

        Ok(&self.positions[index])
    }

    /// Exit decision for one position, in fixed precedence:
    /// time stop, then take profit, then stop loss
    pub fn exit_reason(&self, position: &Position, now: Timestamp, mid: f64) -> Option<ExitReason> {
        if now - position.entry_ts > self.config.time_stop_seconds {
            return Some(ExitReason::TimeStop);
        }

        let position_return = position.return_ratio(mid);
        if position_return >= self.config.take_profit {
            Some(ExitReason::TakeProfit)
        } else if position_return < -self.config.stop_loss {
            Some(ExitReason::StopLoss)
        } else {
            None
        }
    }

    /// Check every open position against `mid` and close the ones that hit an exit
    ///
    /// Returns the transactions closed in this cycle, in entry order.
    pub fn evaluate_exits(
        &mut self,
        now: Timestamp,
        mid: f64,
    ) -> Result<Vec<Transaction>, EngineError> {
        // Decide first, then close, so the position list is not mutated mid-scan
        let to_close: Vec<(Timestamp, ExitReason)> = self
            .positions
            .iter()
            .filter_map(|p| self.exit_reason(p, now, mid).map(|reason| (p.entry_ts, reason)))
            .collect();

        to_close
            .into_iter()
            .map(|(entry_ts, reason)| self.close(entry_ts, now, mid, reason))
            .collect()
    }

    /// Close the position opened at `entry_ts` and append its transaction
    pub fn close(
        &mut self,
        entry_ts: Timestamp,
        exit_ts: Timestamp,
        exit_price: f64,
        reason: ExitReason,
    ) -> Result<Transaction, EngineError> {
        let index = self
            .positions
            .iter()
            .position(|p| p.entry_ts == entry_ts)
            .ok_or(EngineError::PositionNotFound(entry_ts))?;
        let position = self.positions.remove(index);

        let transaction = Transaction {
            entry_ts: position.entry_ts,
            entry_price: position.entry_price,
            exit_ts,
            exit_price,
            quantity: position.quantity,
            side: position.direction(),
            pnl_ratio: position.return_ratio(exit_price),
            exit_reason: reason,
        };

        self.transactions.push(transaction.clone());
        Ok(transaction)
    }

    pub fn get_position(&self, entry_ts: Timestamp) -> Option<&Position> {
        self.positions.iter().find(|p| p.entry_ts == entry_ts)
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn has_open_positions(&self) -> bool {
        !self.positions.is_empty()
    }

    /// Append-only log of closed trades
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn summary(&self) -> SessionSummary {
        let total_trades = self.transactions.len();
        let winning_trades = self.transactions.iter().filter(|t| t.pnl_ratio > 0.0).count();
        let losing_trades = self.transactions.iter().filter(|t| t.pnl_ratio < 0.0).count();
        let total_pnl_ratio: f64 = self.transactions.iter().map(|t| t.pnl_ratio).sum();
        let avg_pnl_ratio = if total_trades > 0 {
            total_pnl_ratio / total_trades as f64
        } else {
            0.0
        };

        SessionSummary {
            total_trades,
            winning_trades,
            losing_trades,
            total_pnl_ratio,
            avg_pnl_ratio,
            open_positions: self.positions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PositionManager {
        PositionManager::new(ExitConfig::default())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_open_position() {
        let mut pm = manager();
        let position = pm.open(100.0, 50_000.0, -0.01).unwrap();

        assert_eq!(position.entry_price, 50_000.0);
        assert_eq!(position.direction(), Direction::Short);
        assert!(pm.has_open_positions());
        assert_eq!(pm.open_positions().len(), 1);
    }

    #[test]
    fn test_open_returns_the_new_position() {
        let mut pm = manager();
        pm.open(1.0, 100.0, 0.01).unwrap();
        pm.open(2.0, 101.0, -0.01).unwrap();

        let position = pm.open(3.0, 102.0, 0.02).unwrap();
        assert_eq!(position.entry_ts, 3.0);
        assert_eq!(position.entry_price, 102.0);
        assert_eq!(pm.open_positions().len(), 3);
    }

    #[test]
    fn test_prevent_duplicate_entry_timestamp() {
        let mut pm = manager();
        pm.open(100.0, 50_000.0, 0.01).unwrap();

        let result = pm.open(100.0, 50_010.0, 0.01);
        assert_eq!(result.unwrap_err(), EngineError::DuplicatePosition(100.0));
        assert_eq!(pm.open_positions().len(), 1);
    }

    #[test]
    fn test_take_profit_long() {
        let mut pm = manager();
        pm.open(0.0, 100.0, 0.01).unwrap();

        let closed = pm.evaluate_exits(5.0, 100.09).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason, ExitReason::TakeProfit);
        assert_eq!(closed[0].side, Direction::Long);
        assert_close(closed[0].pnl_ratio, 0.0009);
        assert!(!pm.has_open_positions());
    }

    #[test]
    fn test_take_profit_short() {
        let mut pm = manager();
        pm.open(0.0, 100.0, -0.01).unwrap();

        let closed = pm.evaluate_exits(5.0, 99.9).unwrap();
        assert_eq!(closed[0].exit_reason, ExitReason::TakeProfit);
        assert_eq!(closed[0].side, Direction::Short);
        assert_close(closed[0].pnl_ratio, 0.001);
    }

    #[test]
    fn test_stop_loss() {
        let mut pm = manager();
        pm.open(0.0, 100.0, 0.01).unwrap();

        // -0.05% exactly is not below -SL
        assert!(pm.evaluate_exits(1.0, 99.95).unwrap().is_empty());

        let closed = pm.evaluate_exits(2.0, 99.94).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason, ExitReason::StopLoss);
        assert!(closed[0].pnl_ratio < 0.0);
    }

    #[test]
    fn test_within_band_stays_open() {
        let mut pm = manager();
        pm.open(0.0, 100.0, 0.01).unwrap();

        for (i, mid) in [100.0, 100.05, 99.96, 100.07].iter().enumerate() {
            assert!(pm.evaluate_exits(i as f64, *mid).unwrap().is_empty());
        }
        assert_eq!(pm.open_positions().len(), 1);
        assert!(pm.transactions().is_empty());
    }

    #[test]
    fn test_time_stop_takes_precedence_over_take_profit() {
        let mut pm = manager();
        pm.open(0.0, 100.0, 0.01).unwrap();

        let closed = pm.evaluate_exits(16.0, 100.09).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason, ExitReason::TimeStop);
        assert_close(closed[0].pnl_ratio, 0.0009);
    }

    #[test]
    fn test_time_stop_boundary() {
        let mut pm = manager();
        pm.open(0.0, 100.0, 0.01).unwrap();

        // Exactly 15s is not past the stop
        assert!(pm.evaluate_exits(15.0, 100.0).unwrap().is_empty());

        let closed = pm.evaluate_exits(15.001, 100.0).unwrap();
        assert_eq!(closed[0].exit_reason, ExitReason::TimeStop);
        assert_eq!(closed[0].pnl_ratio, 0.0);
    }

    #[test]
    fn test_each_position_closed_exactly_once() {
        let mut pm = manager();
        pm.open(0.0, 100.0, 0.01).unwrap();
        pm.open(1.0, 100.0, -0.01).unwrap();
        pm.open(2.0, 100.5, 0.01).unwrap();

        // Long at 100 hits TP, short at 100 hits SL, long at 100.5 hits SL
        let closed = pm.evaluate_exits(3.0, 100.1).unwrap();
        assert_eq!(closed.len(), 3);
        assert_eq!(closed[0].exit_reason, ExitReason::TakeProfit);
        assert_eq!(closed[1].exit_reason, ExitReason::StopLoss);
        assert_eq!(closed[2].exit_reason, ExitReason::StopLoss);

        assert!(pm.evaluate_exits(4.0, 100.1).unwrap().is_empty());
        assert_eq!(pm.transactions().len(), 3);

        let mut entries: Vec<f64> = pm.transactions().iter().map(|t| t.entry_ts).collect();
        entries.dedup();
        assert_eq!(entries, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_close_unknown_position() {
        let mut pm = manager();
        let result = pm.close(42.0, 50.0, 100.0, ExitReason::TimeStop);
        assert_eq!(result.unwrap_err(), EngineError::PositionNotFound(42.0));
    }

    #[test]
    fn test_transaction_serializes_labels() {
        let mut pm = manager();
        pm.open(0.0, 100.0, -0.01).unwrap();
        let tx = pm.close(0.0, 20.0, 100.0, ExitReason::TimeStop).unwrap();

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["side"], "short");
        assert_eq!(json["exit_reason"], "time_stop");
        assert_eq!(json["quantity"], -0.01);
    }

    #[test]
    fn test_summary() {
        let mut pm = manager();
        pm.open(0.0, 100.0, 0.01).unwrap();
        pm.open(1.0, 100.0, -0.01).unwrap();
        pm.evaluate_exits(2.0, 100.1).unwrap();
        pm.open(3.0, 100.0, 0.01).unwrap();

        let summary = pm.summary();
        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.winning_trades, 1);
        assert_eq!(summary.losing_trades, 1);
        assert_close(summary.total_pnl_ratio, 0.0);
        assert_eq!(summary.open_positions, 1);
    }
}
