use crate::config::WallConfig;
use crate::models::{BookSide, Level, Timestamp, WallEvent};

/// A resting level anomalously large relative to its side's average
#[derive(Debug, Clone, PartialEq)]
pub struct Wall {
    pub side: BookSide,
    pub price: f64,
    pub size: f64, // Size at first detection, never re-baselined
    pub created_ts: Timestamp,
}

/// Tracks bid and ask walls across book snapshots and reports their removal
///
/// Walls are kept per side in detection order. Only the latest removal is
/// retained in a single slot until consumed.
#[derive(Debug, Clone)]
pub struct WallTracker {
    config: WallConfig,
    bid_walls: Vec<Wall>,
    ask_walls: Vec<Wall>,
    last_event: Option<WallEvent>,
}

impl WallTracker {
    pub fn new(config: WallConfig) -> Self {
        Self {
            config,
            bid_walls: Vec::new(),
            ask_walls: Vec::new(),
            last_event: None,
        }
    }

    /// Detect new walls in this snapshot, then check tracked walls for removal
    pub fn update(&mut self, timestamp: Timestamp, bids: &[Level], asks: &[Level]) {
        let wall_factor = self.config.wall_factor;
        detect_walls(&mut self.bid_walls, BookSide::Bid, timestamp, bids, wall_factor);
        detect_walls(&mut self.ask_walls, BookSide::Ask, timestamp, asks, wall_factor);

        self.check_removal(timestamp, bids, asks);
    }

    /// Remove every tracked wall whose level vanished or decayed below
    /// `drop_ratio` of its reference size
    pub fn check_removal(&mut self, timestamp: Timestamp, bids: &[Level], asks: &[Level]) {
        let drop_ratio = self.config.drop_ratio;
        let removed_bids = collect_removed(&self.bid_walls, bids, drop_ratio, timestamp);
        let removed_asks = collect_removed(&self.ask_walls, asks, drop_ratio, timestamp);

        self.bid_walls
            .retain(|wall| !removed_bids.iter().any(|event| event.price == wall.price));
        self.ask_walls
            .retain(|wall| !removed_asks.iter().any(|event| event.price == wall.price));

        for event in removed_bids.into_iter().chain(removed_asks) {
            tracing::debug!(
                side = %event.side,
                price = event.price,
                old_size = event.old_size,
                new_size = event.new_size,
                "Wall removed"
            );
            if let Some(previous) = self.last_event.replace(event) {
                tracing::debug!(
                    side = %previous.side,
                    price = previous.price,
                    "Unconsumed wall event overwritten"
                );
            }
        }
    }

    pub fn bid_walls(&self) -> &[Wall] {
        &self.bid_walls
    }

    pub fn ask_walls(&self) -> &[Wall] {
        &self.ask_walls
    }

    pub fn pending_event(&self) -> Option<&WallEvent> {
        self.last_event.as_ref()
    }

    /// Consume the pending removal event
    pub fn take_event(&mut self) -> Option<WallEvent> {
        self.last_event.take()
    }
}

fn average_size(levels: &[Level]) -> f64 {
    if levels.is_empty() {
        return 0.0;
    }
    levels.iter().map(|level| level.size).sum::<f64>() / levels.len() as f64
}

fn detect_walls(
    walls: &mut Vec<Wall>,
    side: BookSide,
    timestamp: Timestamp,
    levels: &[Level],
    wall_factor: f64,
) {
    let threshold = average_size(levels) * wall_factor;

    for level in levels {
        if level.size > threshold && !walls.iter().any(|wall| wall.price == level.price) {
            tracing::debug!(side = %side, price = level.price, size = level.size, "Wall detected");
            walls.push(Wall {
                side,
                price: level.price,
                size: level.size,
                created_ts: timestamp,
            });
        }
    }
}

fn collect_removed(
    walls: &[Wall],
    levels: &[Level],
    drop_ratio: f64,
    timestamp: Timestamp,
) -> Vec<WallEvent> {
    walls
        .iter()
        .filter_map(|wall| {
            let current = levels
                .iter()
                .find(|level| level.price == wall.price)
                .map(|level| level.size)
                .unwrap_or(0.0);

            (current < wall.size * drop_ratio).then_some(WallEvent {
                side: wall.side,
                price: wall.price,
                old_size: wall.size,
                new_size: current,
                removed_ts: timestamp,
            })
        })
        .collect()
}
