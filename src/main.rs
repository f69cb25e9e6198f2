use anyhow::Context;
use clap::{Parser, Subcommand};
use micropulse::engine::{CycleOutcome, MicroPulseEngine};
use micropulse::feed::{self, EVENT_QUEUE_CAPACITY};
use micropulse::models::MarketEvent;
use micropulse::persistence::{record_outcome, JsonlRecorder, RecordSink};
use micropulse::AppConfig;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "micropulse", version, about = "Order book microstructure signal engine")]
struct Cli {
    /// Config file (TOML, JSON or YAML). Defaults to ./micropulse.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Consume the live Binance futures stream
    Live {
        /// Override feed.symbol, e.g. ethusdt
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Replay recorded combined-stream messages, one JSON object per line
    Replay { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut app = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    tracing::info!("🚀 MicroPulse starting");
    tracing::info!(
        window_seconds = app.engine.indicators.window_seconds,
        wall_factor = app.engine.walls.wall_factor,
        drop_ratio = app.engine.walls.drop_ratio,
        min_spike = app.engine.signals.min_spike,
        min_cvd = app.engine.signals.min_cvd,
        take_profit = app.engine.exits.take_profit,
        stop_loss = app.engine.exits.stop_loss,
        time_stop_seconds = app.engine.exits.time_stop_seconds,
        "Engine configuration"
    );

    let (tx, rx) = mpsc::channel::<MarketEvent>(EVENT_QUEUE_CAPACITY);

    let feed_task: JoinHandle<anyhow::Result<()>> = match cli.command {
        Command::Live { symbol } => {
            if let Some(symbol) = symbol {
                app.feed.symbol = symbol;
            }
            let url = app.feed.stream_url();
            tokio::spawn(feed::live::run(url, tx))
        }
        Command::Replay { file } => {
            tokio::spawn(async move { feed::replay::run(file, tx).await.map(|_| ()) })
        }
    };

    let mut engine = MicroPulseEngine::new(app.engine.clone())?;
    let mut recorder = JsonlRecorder::from_config(&app.output)?;

    dispatch(&mut engine, &mut recorder, rx).await;

    // Shutdown: nothing else is admitted, flush what was recorded
    recorder.flush().context("failed to flush records")?;

    if feed_task.is_finished() {
        match feed_task.await {
            Ok(Err(error)) => tracing::error!(%error, "Feed exited with error"),
            Err(error) => tracing::error!(%error, "Feed task panicked"),
            Ok(Ok(())) => {}
        }
    } else {
        feed_task.abort();
    }

    let summary = engine.positions().summary();
    tracing::info!(
        trades = summary.total_trades,
        wins = summary.winning_trades,
        losses = summary.losing_trades,
        total_pnl_ratio = summary.total_pnl_ratio,
        avg_pnl_ratio = summary.avg_pnl_ratio,
        still_open = summary.open_positions,
        "👋 MicroPulse stopped"
    );

    Ok(())
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("micropulse=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Single consumer of the event queue: one full engine cycle per event
async fn dispatch(
    engine: &mut MicroPulseEngine,
    recorder: &mut dyn RecordSink,
    mut rx: Receiver<MarketEvent>,
) {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            event = rx.recv() => match event {
                Some(event) => handle_event(engine, recorder, &event),
                None => {
                    tracing::info!("Feed ended, shutting down...");
                    break;
                }
            }
        }
    }
}

fn handle_event(engine: &mut MicroPulseEngine, recorder: &mut dyn RecordSink, event: &MarketEvent) {
    let outcome = match engine.process(event) {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::warn!(%error, ts = event.timestamp(), "Dropping event");
            return;
        }
    };

    log_cycle(&outcome);

    if let Err(error) = record_outcome(recorder, &outcome) {
        tracing::error!(%error, "Failed to record cycle output");
    }
}

fn log_cycle(outcome: &CycleOutcome) {
    if let Some(stats) = &outcome.stats {
        tracing::debug!(
            mid = stats.mid,
            obi = stats.obi,
            spike_up = stats.spike_up,
            spike_down = stats.spike_down,
            buy = stats.window_buy_qty,
            sell = stats.window_sell_qty,
            window_cvd = stats.window_cvd,
            cvd = stats.cvd,
            trades = stats.window_trade_count,
            trades_per_sec = stats.trades_per_sec,
            avg_trade_size = stats.avg_trade_size,
            "Window stats"
        );
    }

    if let Some(wall) = &outcome.evaluated_wall {
        tracing::info!(
            side = %wall.side,
            price = wall.price,
            old_size = wall.old_size,
            new_size = wall.new_size,
            "Wall pulled"
        );
    }

    if let Some(signal) = &outcome.signal {
        tracing::info!(
            side = %signal.side,
            price = signal.entry_price,
            ts = signal.entry_timestamp,
            "📈 SIGNAL"
        );
    }

    for tx in &outcome.closed {
        tracing::info!(
            side = %tx.side,
            entry = tx.entry_price,
            exit = tx.exit_price,
            pnl_ratio = tx.pnl_ratio,
            reason = %tx.exit_reason,
            "Position closed"
        );
    }
}
