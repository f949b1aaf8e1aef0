//! Donchian Desk - Main Entry Point
//!
//! Replays a bar file through the paper gateway and accepts slot commands
//! from stdin.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use donchian_desk::config::Config;
use donchian_desk::engine::{EventLoop, ReplayDriver};
use donchian_desk::exchange::PaperGateway;
use donchian_desk::feed::{BarSeries, ChannelIndicator};
use donchian_desk::panel::ConsolePanel;
use donchian_desk::strategy::{DonchianStrategy, OperatorInput, StrategyEvent, StrategySettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Donchian Desk CLI
#[derive(Parser)]
#[command(name = "donchian-desk")]
#[command(version, about = "Donchian channel entry desk with ATR-scaled OCO brackets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a bar file through the paper gateway and trade it from stdin
    Run {
        /// Path to CSV bar file
        #[arg(short, long)]
        feed: String,

        /// Leading bars replayed in historical mode (overrides config)
        #[arg(long)]
        history_bars: Option<usize>,

        /// Delay between bars in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Shut down as soon as the replay has finished
        #[arg(long)]
        exit_after_replay: bool,
    },

    /// Load and validate configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize comprehensive logging
    init_logging()?;

    // Load configuration
    let config = Config::load()?;
    config.validate().context("Invalid configuration")?;
    log_config(&config);

    match cli.command {
        Commands::CheckConfig => {
            info!("✅ Configuration is valid");
            Ok(())
        }
        Commands::Run {
            feed,
            history_bars,
            interval_ms,
            exit_after_replay,
        } => {
            run(
                &config,
                &feed,
                history_bars.unwrap_or(config.paper.history_bars),
                interval_ms.unwrap_or(config.paper.bar_interval_ms),
                exit_after_replay,
            )
            .await
        }
    }
}

async fn run(
    config: &Config,
    feed: &str,
    history_bars: usize,
    interval_ms: u64,
    exit_after_replay: bool,
) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║          Donchian Desk v{} - Paper Replay                ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let series = BarSeries::load(feed)?;
    info!(bars = series.len(), %feed, "📂 Bar file loaded");

    let (order_tx, order_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let gateway = Arc::new(PaperGateway::new(order_tx, config.paper.supports_oco));
    let mut strategy =
        DonchianStrategy::new(StrategySettings::from(&config.strategy), gateway.clone());
    strategy.add_observer(Arc::new(ConsolePanel::new()));

    let replay = ReplayDriver::new(
        series.into_bars(),
        ChannelIndicator::new(config.strategy.donchian_period, config.strategy.atr_period),
        (*gateway).clone(),
        event_tx.clone(),
        history_bars,
        Duration::from_millis(interval_ms),
    );
    let replay_tx = event_tx.clone();
    tokio::spawn(async move {
        match replay.run().await {
            Ok(summary) => {
                info!(
                    bars = summary.bars,
                    fills = summary.fills,
                    "📈 Replay finished, desk is live"
                );
                if exit_after_replay {
                    replay_tx.send(StrategyEvent::Shutdown).ok();
                }
            }
            Err(e) => error!(error = %e, "Replay aborted"),
        }
    });

    // Operator console
    let console_tx = event_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    let event = match line.parse::<OperatorInput>() {
                        Ok(OperatorInput::Slot(command)) => StrategyEvent::Command(command),
                        Ok(OperatorInput::Close) => StrategyEvent::ClosePosition,
                        Ok(OperatorInput::CancelAll) => StrategyEvent::CancelAll,
                        Ok(OperatorInput::Status) => StrategyEvent::Status,
                        Err(e) => {
                            warn!(error = %e, "Ignoring console input");
                            continue;
                        }
                    };
                    if console_tx.send(event).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Console read failed");
                    break;
                }
            }
        }
    });

    // Shutdown signal
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        event_tx.send(StrategyEvent::Shutdown).ok();
    });

    info!("🚀 Starting event loop...");
    let (strategy, loop_stats) = EventLoop::new(strategy, event_rx, order_rx).run().await;

    let paper = gateway.stats().await;
    let snapshot = strategy.snapshot();
    info!(
        events = loop_stats.events,
        order_updates = loop_stats.order_updates,
        faults = loop_stats.faults,
        orders = paper.order_count,
        fills = paper.fill_count,
        position = %paper.position,
        active = snapshot.position.active,
        "👋 Donchian Desk shutdown complete"
    );
    Ok(())
}

/// Initialize comprehensive logging with file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "donchian-desk.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("donchian_desk=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!(
        "   Donchian Period: {} bars",
        config.strategy.donchian_period
    );
    info!("   ATR Period: {} bars", config.strategy.atr_period);
    info!(
        "   Target / Stop: {}x / {}x ATR",
        config.strategy.target_multiplier, config.strategy.stop_multiplier
    );
    info!("   Quantity: {}", config.strategy.quantity);
    info!(
        "   Warm-up: {} bars",
        config.strategy.bars_required_to_trade
    );
    info!(
        "   Paper OCO: {}",
        if config.paper.supports_oco { "gateway" } else { "strategy" }
    );
}
