use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::execution::{PositionManager, Transaction};
use crate::indicators::IndicatorEngine;
use crate::models::{MarketEvent, SignalEvent, WallEvent, WindowStats};
use crate::strategy::SignalEvaluator;

/// Everything one processed event produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    pub stats: Option<WindowStats>,
    /// Wall event consumed by the signal evaluator this cycle
    pub evaluated_wall: Option<WallEvent>,
    pub signal: Option<SignalEvent>,
    pub closed: Vec<Transaction>,
}

/// Engine context: indicators, signal rule and positions for one instrument
///
/// Events must be fed one at a time in arrival order; each call to
/// `process` runs a full cycle before returning.
pub struct MicroPulseEngine {
    config: EngineConfig,
    indicators: IndicatorEngine,
    evaluator: SignalEvaluator,
    positions: PositionManager,
}

impl MicroPulseEngine {
    /// Build an engine from validated tunables
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        config.validate()?;

        Ok(Self {
            indicators: IndicatorEngine::new(&config.indicators, config.walls.clone()),
            evaluator: SignalEvaluator::new(config.signals.clone()),
            positions: PositionManager::new(config.exits.clone()),
            config,
        })
    }

    /// Run one cycle: indicator update, stats snapshot, signal check, exit check
    ///
    /// Book and trade validation run before any state changes, so an
    /// `InvalidBook` or `InvalidTrade` leaves every component untouched and
    /// the caller decides whether to drop the event or stop. Validated books
    /// only retain positive mids, which keeps the `DivisionByZero` guard in
    /// the stats snapshot out of reach.
    pub fn process(&mut self, event: &MarketEvent) -> Result<CycleOutcome, EngineError> {
        let now = event.timestamp();

        match event {
            MarketEvent::Book(book) => {
                self.indicators
                    .on_book_update(book.timestamp, &book.bids, &book.asks)?
            }
            MarketEvent::Trade(trade) => {
                self.indicators
                    .on_trade(trade.timestamp, trade.quantity, trade.buyer_is_maker)?
            }
        }

        let Some(stats) = self.indicators.snapshot_stats(now)? else {
            return Ok(CycleOutcome::default());
        };

        let mut outcome = CycleOutcome::default();

        if stats.wall_event.is_some() {
            let direction = self.evaluator.evaluate(&stats);
            outcome.evaluated_wall = self.indicators.take_wall_event();

            if let Some(direction) = direction {
                let quantity = self.evaluator.signed_quantity(direction);
                match self.positions.open(now, stats.mid, quantity) {
                    Ok(position) => {
                        outcome.signal = Some(SignalEvent {
                            side: direction,
                            entry_timestamp: position.entry_ts,
                            entry_price: position.entry_price,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, side = %direction, "Signal skipped");
                    }
                }
            }
        }

        outcome.closed = self.positions.evaluate_exits(now, stats.mid)?;
        outcome.stats = Some(stats);

        Ok(outcome)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn indicators(&self) -> &IndicatorEngine {
        &self.indicators
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }
}
