use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "micropulse.toml";
const ENV_PREFIX: &str = "MICROPULSE";

/// Trailing window for the price and trade buffers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub window_seconds: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            window_seconds: 10.0,
        }
    }
}

/// Liquidity wall detection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WallConfig {
    /// Multiple of the side's average level size. Must stay below the number
    /// of levels per side, otherwise no single level can ever qualify.
    pub wall_factor: f64,
    pub drop_ratio: f64, // Fraction of the reference size below which the wall is gone
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            wall_factor: 4.0,
            drop_ratio: 0.3,
        }
    }
}

/// Entry thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalConfig {
    pub min_spike: f64,
    pub min_cvd: f64,
    pub position_size: f64, // Unsigned quantity per entry
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_spike: 0.0005,
            min_cvd: 0.1,
            position_size: 0.01,
        }
    }
}

/// Exit thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExitConfig {
    pub take_profit: f64,
    pub stop_loss: f64,
    pub time_stop_seconds: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            take_profit: 0.0008,
            stop_loss: 0.0005,
            time_stop_seconds: 15.0,
        }
    }
}

/// All tunables of the core
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub indicators: IndicatorConfig,
    pub walls: WallConfig,
    pub signals: SignalConfig,
    pub exits: ExitConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.indicators.window_seconds > 0.0,
            "window_seconds must be positive, got {}",
            self.indicators.window_seconds
        );
        anyhow::ensure!(
            self.walls.wall_factor > 0.0,
            "wall_factor must be positive, got {}",
            self.walls.wall_factor
        );
        anyhow::ensure!(
            self.walls.drop_ratio > 0.0 && self.walls.drop_ratio <= 1.0,
            "drop_ratio must be in (0, 1], got {}",
            self.walls.drop_ratio
        );
        anyhow::ensure!(
            self.signals.min_spike >= 0.0 && self.signals.min_cvd >= 0.0,
            "signal thresholds must be non-negative"
        );
        anyhow::ensure!(
            self.signals.position_size > 0.0,
            "position_size must be positive, got {}",
            self.signals.position_size
        );
        anyhow::ensure!(
            self.exits.take_profit >= 0.0 && self.exits.stop_loss >= 0.0,
            "exit thresholds must be non-negative"
        );
        anyhow::ensure!(
            self.exits.time_stop_seconds > 0.0,
            "time_stop_seconds must be positive, got {}",
            self.exits.time_stop_seconds
        );
        Ok(())
    }
}

/// Upstream stream location (Binance USD-M futures combined stream)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub symbol: String,
    pub depth_levels: u32,
    pub depth_interval_ms: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "wss://fstream.binance.com/stream".to_string(),
            symbol: "btcusdt".to_string(),
            depth_levels: 5,
            depth_interval_ms: 100,
        }
    }
}

impl FeedConfig {
    /// Combined stream URL for partial depth plus trades
    pub fn stream_url(&self) -> String {
        let symbol = self.symbol.to_lowercase();
        format!(
            "{}?streams={}@depth{}@{}ms/{}@trade",
            self.base_url, symbol, self.depth_levels, self.depth_interval_ms, symbol
        )
    }
}

/// Where records are appended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub transactions_path: String,
    pub history_path: String,
    pub record_history: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            transactions_path: "transactions.jsonl".to_string(),
            history_path: "history.jsonl".to_string(),
            record_history: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub feed: FeedConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load defaults, then the config file, then `MICROPULSE__SECTION__KEY` env vars.
    ///
    /// An explicit `path` must exist; the default `micropulse.toml` is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file_source = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.engine.validate()?;
        Ok(app)
    }
}
