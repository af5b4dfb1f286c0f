//! Courier CLI entry point.
//!
//! Provides `pipe`, `mode`, and `status` subcommands for relaying a piped
//! process's output to Telegram, switching the persisted relay mode, and
//! inspecting the current configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use courier::config::{resolve_config_path, CourierConfig, TomlConfigStore};
use courier::layer::RelayLayer;
use courier::logging;
use courier::notifier::TelegramNotifier;
use courier::pipe;
use courier::relay::{self, LogMode, LogRelay};
use courier::watcher::ConfigWatcher;

/// Courier: forwards process logs to Telegram admin chats in batches.
#[derive(Parser)]
#[command(name = "courier", version, about)]
struct Cli {
    /// Path to `courier.toml` (default: `$COURIER_CONFIG` or `~/.courier/courier.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Read log lines from stdin and relay them until EOF or Ctrl+C.
    Pipe,
    /// Persist a new relay mode: disabled, important or all.
    Mode {
        /// Target mode.
        mode: LogMode,
    },
    /// Print the effective relay configuration.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref())?;

    match cli.command {
        Command::Pipe => handle_pipe(&config_path).await,
        Command::Mode { mode } => handle_mode(&config_path, mode),
        Command::Status => handle_status(&config_path),
    }
}

/// Relay stdin to Telegram until the input ends.
async fn handle_pipe(config_path: &Path) -> anyhow::Result<()> {
    let store = Arc::new(
        TomlConfigStore::open(config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?,
    );
    let config = CourierConfig::from_store(&store)?;

    // A missing .env is fine; the token may come from the real environment.
    let _ = dotenvy::dotenv();
    let bot_token = std::env::var(&config.telegram.bot_token_env).with_context(|| {
        format!(
            "telegram bot token not set (expected in ${})",
            config.telegram.bot_token_env
        )
    })?;

    let notifier = Arc::new(TelegramNotifier::new(&bot_token));
    let relay = Arc::new(LogRelay::new(
        store.clone(),
        notifier,
        config.relay.clone(),
    ));

    let logs_dir = config_path
        .parent()
        .map_or_else(|| PathBuf::from("logs"), |dir| dir.join("logs"));
    let _logging_guard =
        logging::init_production(&logs_dir, Some(RelayLayer::new(Arc::clone(&relay))))?;

    relay.start()?;
    info!(
        mode = %relay.mode(),
        destinations = relay.destinations().len(),
        "courier pipe started"
    );

    // Picks up `courier mode` run from another shell.
    let _config_watcher = match ConfigWatcher::spawn(config_path, Arc::clone(&relay)) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "config hot reload unavailable");
            None
        }
    };

    if relay.is_logs_enabled() {
        let notice = format!("courier started (mode {})", relay.mode());
        relay.notify_admins(&notice).await;
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = tokio::select! {
        result = pipe::forward_lines(stdin, &relay) => result.map(Some),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, stopping relay");
            Ok(None)
        }
    };

    let outcome = relay.stop().await;
    // Input ended normally: send what is still queued before exiting.
    if matches!(result, Ok(Some(_))) {
        let report = relay.drain_pending(config.relay.shutdown_grace()).await;
        if report.timed_out {
            warn!(remaining = report.remaining, "final drain timed out");
        }
    }
    let pending = relay.queue().len();
    if pending > 0 {
        warn!(pending, "relay stopped with undelivered lines");
    }

    match result? {
        Some(stats) => info!(
            lines = stats.lines,
            queued = stats.queued,
            ?outcome,
            "courier pipe finished"
        ),
        None => info!(?outcome, "courier pipe interrupted"),
    }
    Ok(())
}

/// Persist a new relay mode.
fn handle_mode(config_path: &Path, mode: LogMode) -> anyhow::Result<()> {
    logging::init_cli();
    let store = TomlConfigStore::open(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    relay::persist_mode(&store, mode)
        .with_context(|| format!("failed to save {}", config_path.display()))?;
    println!("log mode set to {mode} ({})", config_path.display());
    Ok(())
}

/// Print the effective configuration.
fn handle_status(config_path: &Path) -> anyhow::Result<()> {
    let store = TomlConfigStore::open(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let config = CourierConfig::from_store(&store)?;
    let snapshot = relay::load_snapshot(&store);

    println!("config:        {}", config_path.display());
    println!("mode:          {}", snapshot.mode);
    println!("logs enabled:  {}", snapshot.mode.is_enabled());
    println!("destinations:  {:?}", snapshot.destinations);
    println!(
        "flush:         every {}s, up to {} lines",
        config.relay.flush_interval().as_secs(),
        config.relay.batch_size
    );
    match config.relay.queue_capacity() {
        Some(cap) => println!("queue bound:   {cap} (drop oldest)"),
        None => println!("queue bound:   unbounded"),
    }
    println!("keywords:      {}", config.relay.important_keywords.join(", "));
    Ok(())
}
