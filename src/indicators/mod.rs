// Streaming microstructure indicators
// Mid-price, order book imbalance, volume delta and liquidity walls

pub mod engine;
pub mod walls;
pub mod window;

pub use engine::{IndicatorEngine, TradeSample};
pub use walls::{Wall, WallTracker};
pub use window::TimeWindowBuffer;
