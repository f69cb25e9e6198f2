use super::walls::WallTracker;
use super::window::TimeWindowBuffer;
use crate::config::{IndicatorConfig, WallConfig};
use crate::error::EngineError;
use crate::models::{Level, Timestamp, TradeSide, WallEvent, WindowStats};

/// A trade as retained in the trade window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeSample {
    pub side: TradeSide,
    pub quantity: f64,
}

/// Streaming microstructure indicators for a single instrument
///
/// Tracks mid-price, order book imbalance and cumulative volume delta, keeps
/// trailing windows of mid prices and trades, and owns the wall tracker.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    mid_price: f64,
    obi: f64,
    cum_buy_vol: f64,
    cum_sell_vol: f64,
    cvd: f64,
    price_buffer: TimeWindowBuffer<f64>,
    trade_buffer: TimeWindowBuffer<TradeSample>,
    walls: WallTracker,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig, wall_config: WallConfig) -> Self {
        Self {
            mid_price: 0.0,
            obi: 0.0,
            cum_buy_vol: 0.0,
            cum_sell_vol: 0.0,
            cvd: 0.0,
            price_buffer: TimeWindowBuffer::new(config.window_seconds),
            trade_buffer: TimeWindowBuffer::new(config.window_seconds),
            walls: WallTracker::new(wall_config),
        }
    }

    /// Apply an order book snapshot
    ///
    /// The book and its mid are validated before any state changes, so a
    /// rejected update leaves mid, OBI, windows and walls untouched. Every
    /// retained mid is therefore positive and finite.
    pub fn on_book_update(
        &mut self,
        timestamp: Timestamp,
        bids: &[Level],
        asks: &[Level],
    ) -> Result<(), EngineError> {
        validate_side("bid", bids)?;
        validate_side("ask", asks)?;

        let mid = (bids[0].price + asks[0].price) / 2.0;
        if !mid.is_finite() {
            return Err(EngineError::InvalidBook(format!("mid out of range: {}", mid)));
        }

        self.mid_price = mid;
        self.price_buffer.push(timestamp, mid);
        self.trim(timestamp);

        self.walls.update(timestamp, bids, asks);

        let total_bid: f64 = bids.iter().map(|level| level.size).sum();
        let total_ask: f64 = asks.iter().map(|level| level.size).sum();
        let total = total_bid + total_ask;
        self.obi = if total == 0.0 {
            0.0
        } else {
            (total_bid - total_ask) / total
        };

        Ok(())
    }

    /// Apply an executed market trade
    pub fn on_trade(
        &mut self,
        timestamp: Timestamp,
        quantity: f64,
        buyer_is_maker: bool,
    ) -> Result<(), EngineError> {
        if !(quantity > 0.0 && quantity.is_finite()) {
            return Err(EngineError::InvalidTrade(quantity));
        }

        let side = TradeSide::from_buyer_is_maker(buyer_is_maker);
        match side {
            TradeSide::Buy => self.cum_buy_vol += quantity,
            TradeSide::Sell => self.cum_sell_vol += quantity,
        }

        self.trade_buffer.push(timestamp, TradeSample { side, quantity });
        self.trim(timestamp);

        self.cvd = self.cum_buy_vol - self.cum_sell_vol;
        Ok(())
    }

    /// Windowed statistics as of `now`
    ///
    /// Returns `Ok(None)` until a book snapshot is retained in the window.
    /// Spikes are measured from the oldest retained mid, not from the exact
    /// window start.
    pub fn snapshot_stats(&self, now: Timestamp) -> Result<Option<WindowStats>, EngineError> {
        let mut mids = self.price_buffer.iter_since(now).map(|(_, mid)| *mid);
        let Some(baseline) = mids.next() else {
            return Ok(None);
        };
        if baseline == 0.0 || !baseline.is_finite() {
            return Err(EngineError::DivisionByZero);
        }

        let (high, low) = mids.fold((baseline, baseline), |(high, low), mid| {
            (high.max(mid), low.min(mid))
        });
        let spike_up = (high - baseline) / baseline;
        let spike_down = (baseline - low) / baseline;

        let mut window_buy_qty = 0.0;
        let mut window_sell_qty = 0.0;
        let mut window_trade_count = 0;
        for (_, trade) in self.trade_buffer.iter_since(now) {
            match trade.side {
                TradeSide::Buy => window_buy_qty += trade.quantity,
                TradeSide::Sell => window_sell_qty += trade.quantity,
            }
            window_trade_count += 1;
        }

        let (trades_per_sec, avg_trade_size) = if window_trade_count > 0 {
            (
                window_trade_count as f64 / self.trade_buffer.window_seconds(),
                (window_buy_qty + window_sell_qty) / window_trade_count as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Ok(Some(WindowStats {
            timestamp: now,
            mid: self.mid_price,
            obi: self.obi,
            spike_up,
            spike_down,
            window_buy_qty,
            window_sell_qty,
            window_cvd: window_buy_qty - window_sell_qty,
            cvd: self.cvd,
            window_trade_count,
            trades_per_sec,
            avg_trade_size,
            wall_event: self.walls.pending_event().copied(),
        }))
    }

    pub fn mid_price(&self) -> f64 {
        self.mid_price
    }

    pub fn obi(&self) -> f64 {
        self.obi
    }

    pub fn cvd(&self) -> f64 {
        self.cvd
    }

    pub fn walls(&self) -> &WallTracker {
        &self.walls
    }

    /// Consume the pending wall removal event
    pub fn take_wall_event(&mut self) -> Option<WallEvent> {
        self.walls.take_event()
    }

    pub fn price_samples(&self) -> &TimeWindowBuffer<f64> {
        &self.price_buffer
    }

    pub fn trade_samples(&self) -> &TimeWindowBuffer<TradeSample> {
        &self.trade_buffer
    }

    fn trim(&mut self, now: Timestamp) {
        self.price_buffer.trim(now);
        self.trade_buffer.trim(now);
    }
}

fn validate_side(name: &str, levels: &[Level]) -> Result<(), EngineError> {
    if levels.is_empty() {
        return Err(EngineError::InvalidBook(format!("empty {} side", name)));
    }

    if let Some(level) = levels
        .iter()
        .find(|level| {
            !(level.price > 0.0 && level.price.is_finite())
                || !level.size.is_finite()
                || level.size < 0.0
        })
    {
        return Err(EngineError::InvalidBook(format!(
            "malformed {} level {} @ {}",
            name, level.size, level.price
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> IndicatorEngine {
        IndicatorEngine::new(&IndicatorConfig::default(), WallConfig::default())
    }

    fn book(bid: f64, ask: f64) -> (Vec<Level>, Vec<Level>) {
        (
            vec![Level::new(bid, 2.0), Level::new(bid - 1.0, 1.0)],
            vec![Level::new(ask, 1.0), Level::new(ask + 1.0, 1.0)],
        )
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
    fn test_mid_and_obi() {
        let mut engine = engine();
        let (bids, asks) = book(99.0, 101.0);
        engine.on_book_update(1.0, &bids, &asks).unwrap();

        assert_eq!(engine.mid_price(), 100.0);
        // bid depth 3, ask depth 2
        assert_close(engine.obi(), 0.2);
        assert_eq!(engine.price_samples().len(), 1);
    }

    #[test]
    fn test_obi_zero_depth_is_zero() {
        let mut engine = engine();
        let bids = vec![Level::new(99.0, 0.0)];
        let asks = vec![Level::new(101.0, 0.0)];
        engine.on_book_update(1.0, &bids, &asks).unwrap();
        assert_eq!(engine.obi(), 0.0);
    }

    #[test]
    fn test_empty_side_rejected_without_mutation() {
        let mut engine = engine();
        let (bids, asks) = book(99.0, 101.0);
        engine.on_book_update(1.0, &bids, &asks).unwrap();

        let result = engine.on_book_update(2.0, &[], &asks);
        assert!(matches!(result, Err(EngineError::InvalidBook(_))));
        let result = engine.on_book_update(2.0, &bids, &[]);
        assert!(matches!(result, Err(EngineError::InvalidBook(_))));

        assert_eq!(engine.mid_price(), 100.0);
        assert_eq!(engine.price_samples().len(), 1);
    }

    #[test]
    fn test_malformed_level_rejected() {
        let mut engine = engine();
        let bids = vec![Level::new(f64::NAN, 1.0)];
        let asks = vec![Level::new(101.0, 1.0)];
        assert!(engine.on_book_update(1.0, &bids, &asks).is_err());

        let bids = vec![Level::new(99.0, -1.0)];
        assert!(engine.on_book_update(1.0, &bids, &asks).is_err());
        assert!(engine.snapshot_stats(1.0).unwrap().is_none());
    }

    #[test]
    fn test_trade_classification_and_cvd() {
        let mut engine = engine();
        engine.on_trade(1.0, 0.5, false).unwrap(); // taker bought
        engine.on_trade(1.1, 0.2, true).unwrap(); // taker sold
        engine.on_trade(1.2, 0.1, false).unwrap();

        assert_close(engine.cvd(), 0.4);
        assert_eq!(engine.trade_samples().len(), 3);
    }

    #[test]
    fn test_invalid_trade_does_not_mutate() {
        let mut engine = engine();
        engine.on_trade(1.0, 1.0, false).unwrap();

        assert_eq!(
            engine.on_trade(2.0, 0.0, false),
            Err(EngineError::InvalidTrade(0.0))
        );
        assert!(engine.on_trade(2.0, -3.0, true).is_err());
        assert!(engine.on_trade(2.0, f64::NAN, true).is_err());

        assert_eq!(engine.cvd(), 1.0);
        assert_eq!(engine.trade_samples().len(), 1);
    }

    #[test]
    fn test_cvd_independent_of_window_trimming() {
        let mut engine = engine();
        let mut expected = 0.0;

        for i in 0..100 {
            let qty = 0.01 * (i % 7 + 1) as f64;
            let buyer_is_maker = i % 3 == 0;
            engine.on_trade(i as f64, qty, buyer_is_maker).unwrap();
            expected += if buyer_is_maker { -qty } else { qty };
        }

        // Window only covers the last ~10 seconds, CVD covers everything
        assert!(engine.trade_samples().len() <= 11);
        assert_close(engine.cvd(), expected);
    }

    #[test]
    fn test_no_stats_before_first_book() {
        let mut engine = engine();
        engine.on_trade(1.0, 1.0, false).unwrap();
        assert_eq!(engine.snapshot_stats(1.0), Ok(None));
    }

    #[test]
    fn test_spikes_use_oldest_retained_sample() {
        let mut engine = engine();
        for (ts, mid) in [(0.0, 100.0), (1.0, 100.2), (2.0, 99.9), (3.0, 100.1)] {
            let (bids, asks) = book(mid - 0.5, mid + 0.5);
            engine.on_book_update(ts, &bids, &asks).unwrap();
        }

        let stats = engine.snapshot_stats(3.0).unwrap().unwrap();
        assert_close(stats.mid, 100.1);
        assert_close(stats.spike_up, 0.2 / 100.0);
        assert_close(stats.spike_down, 0.1 / 100.0);

        // Once the 100.0 sample ages out, 100.2 becomes the baseline
        let (bids, asks) = book(99.5, 100.5);
        engine.on_book_update(10.5, &bids, &asks).unwrap();
        let stats = engine.snapshot_stats(10.5).unwrap().unwrap();
        assert_close(stats.spike_up, 0.0);
        assert_close(stats.spike_down, (100.2 - 99.9) / 100.2);
    }

    #[test]
    fn test_non_positive_price_rejected_without_mutation() {
        let mut engine = engine();
        let (bids, asks) = book(99.0, 101.0);
        engine.on_book_update(0.0, &bids, &asks).unwrap();

        let zero = vec![Level::new(0.0, 1.0)];
        let result = engine.on_book_update(1.0, &zero, &zero);
        assert!(matches!(result, Err(EngineError::InvalidBook(_))));

        let negative = vec![Level::new(-1.0, 1.0)];
        assert!(engine.on_book_update(1.0, &negative, &asks).is_err());

        assert_eq!(engine.mid_price(), 100.0);
        assert_eq!(engine.price_samples().len(), 1);
        assert!(engine.snapshot_stats(1.0).unwrap().is_some());
    }

    #[test]
    fn test_overflowing_mid_rejected() {
        let mut engine = engine();
        let bids = vec![Level::new(f64::MAX, 1.0)];
        let asks = vec![Level::new(f64::MAX, 1.0)];

        let result = engine.on_book_update(1.0, &bids, &asks);
        assert!(matches!(result, Err(EngineError::InvalidBook(_))));
        assert!(engine.price_samples().is_empty());
    }

    #[test]
    fn test_trade_trims_price_window() {
        let mut engine = engine();
        let (bids, asks) = book(99.0, 101.0);
        engine.on_book_update(0.0, &bids, &asks).unwrap();
        assert_eq!(engine.price_samples().len(), 1);

        engine.on_trade(10.5, 0.1, false).unwrap();
        assert!(engine.price_samples().is_empty());
        assert_eq!(engine.trade_samples().len(), 1);
        assert!(engine.snapshot_stats(10.5).unwrap().is_none());
    }

    #[test]
    fn test_trade_window_stats() {
        let mut engine = engine();
        let (bids, asks) = book(99.0, 101.0);
        engine.on_book_update(0.0, &bids, &asks).unwrap();
        engine.on_trade(0.5, 0.3, false).unwrap();
        engine.on_trade(1.0, 0.1, true).unwrap();
        engine.on_trade(1.5, 0.2, true).unwrap();

        let stats = engine.snapshot_stats(1.5).unwrap().unwrap();
        assert_close(stats.window_buy_qty, 0.3);
        assert_close(stats.window_sell_qty, 0.3);
        assert_close(stats.window_cvd, 0.0);
        assert_eq!(stats.window_trade_count, 3);
        assert_close(stats.trades_per_sec, 0.3);
        assert_close(stats.avg_trade_size, 0.2);
    }

    #[test]
    fn test_empty_trade_window_defaults_to_zero() {
        let mut engine = engine();
        let (bids, asks) = book(99.0, 101.0);
        engine.on_book_update(0.0, &bids, &asks).unwrap();

        let stats = engine.snapshot_stats(0.0).unwrap().unwrap();
        assert_eq!(stats.window_trade_count, 0);
        assert_eq!(stats.trades_per_sec, 0.0);
        assert_eq!(stats.avg_trade_size, 0.0);
        assert_eq!(stats.window_cvd, 0.0);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let mut engine = engine();
        let (bids, asks) = book(99.0, 101.0);
        engine.on_book_update(0.0, &bids, &asks).unwrap();
        engine.on_trade(0.5, 0.3, false).unwrap();

        let first = engine.snapshot_stats(0.5).unwrap();
        let second = engine.snapshot_stats(0.5).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshot_ignores_expired_samples_without_new_events() {
        let mut engine = engine();
        let (bids, asks) = book(99.0, 101.0);
        engine.on_book_update(0.0, &bids, &asks).unwrap();

        assert!(engine.snapshot_stats(5.0).unwrap().is_some());
        assert!(engine.snapshot_stats(20.0).unwrap().is_none());
    }

    #[test]
    fn test_wall_event_surfaces_in_stats_until_taken() {
        let mut engine = IndicatorEngine::new(
            &IndicatorConfig::default(),
            WallConfig {
                wall_factor: 4.0,
                drop_ratio: 0.3,
            },
        );
        let asks = vec![
            Level::new(100.5, 1.0),
            Level::new(101.0, 1.0),
            Level::new(101.5, 50.0),
            Level::new(102.0, 1.0),
            Level::new(102.5, 1.0),
        ];
        let bids = vec![Level::new(99.5, 1.0), Level::new(99.0, 1.0)];
        engine.on_book_update(0.0, &bids, &asks).unwrap();
        assert_eq!(engine.walls().ask_walls().len(), 1);

        let pulled = vec![Level::new(100.5, 1.0), Level::new(101.0, 1.0)];
        engine.on_book_update(1.0, &bids, &pulled).unwrap();

        let stats = engine.snapshot_stats(1.0).unwrap().unwrap();
        let event = stats.wall_event.unwrap();
        assert_eq!(event.price, 101.5);

        assert!(engine.take_wall_event().is_some());
        let stats = engine.snapshot_stats(1.0).unwrap().unwrap();
        assert!(stats.wall_event.is_none());
    }
}
