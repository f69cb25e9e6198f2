use crate::config::SignalConfig;
use crate::models::{BookSide, Direction, WindowStats};

/// Wall-pull reversal entry rule
///
/// Fires only on a pending wall removal event:
/// - Ask wall pulled after a spike up with net taker selling: SHORT
/// - Bid wall pulled after a spike down with net taker buying: LONG
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    config: SignalConfig,
}

impl SignalEvaluator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Decide the entry direction for these stats, if any
    ///
    /// Pure: the caller is responsible for consuming the wall event
    /// afterwards, whether or not a direction was returned.
    pub fn evaluate(&self, stats: &WindowStats) -> Option<Direction> {
        let wall = stats.wall_event.as_ref()?;

        match wall.side {
            BookSide::Ask
                if stats.spike_up > self.config.min_spike
                    && stats.window_cvd < -self.config.min_cvd =>
            {
                Some(Direction::Short)
            }
            BookSide::Bid
                if stats.spike_down > self.config.min_spike
                    && stats.window_cvd > self.config.min_cvd =>
            {
                Some(Direction::Long)
            }
            _ => None,
        }
    }

    /// Signed quantity for an entry in `direction`
    pub fn signed_quantity(&self, direction: Direction) -> f64 {
        self.config.position_size * direction.sign()
    }
}

impl Default for SignalEvaluator {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}
