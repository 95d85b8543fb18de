//! # Dormwatt: dorm energy balance monitor
//!
//! Polls the lighting and air-conditioning balances, alerts when either runs
//! low, and keeps a monthly JSON history for the dashboard page.
//!
//! Usage:
//!   dormwatt                      # One monitoring pass (same as `run`)
//!   dormwatt daemon               # Repeat every `[monitor] interval_secs`
//!   dormwatt init                 # Create the storage root and empty index
//!   dormwatt reindex              # Rebuild index + recent records from disk
//!   dormwatt config               # Show what is configured (secrets hidden)

use anyhow::Result;
use clap::{Parser, Subcommand};
use dormwatt_core::DormwattConfig;
use dormwatt_monitor::{MonitorRun, RunAborted, RunSummary};
use dormwatt_scheduler::PeriodicRunner;
use dormwatt_store::TimeSeriesStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dormwatt",
    version,
    about = "🔌 Dormwatt: dorm energy balance monitor"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: ~/.dormwatt/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run one monitoring pass
    Run,
    /// Run a pass every `interval_secs` until Ctrl-C
    Daemon {
        /// Override `[monitor] interval_secs`
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Create the storage root and an empty period index
    Init,
    /// Rebuild the period index and recent records without polling
    Reindex,
    /// Print which account and channels are configured
    Config,
}

fn load_config(cli: &Cli) -> dormwatt_core::Result<DormwattConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = shellexpand::tilde(path).to_string();
            DormwattConfig::load_from(std::path::Path::new(&path))?
        }
        None => DormwattConfig::load()?,
    };
    config.apply_env();
    Ok(config)
}

fn log_outcome(outcome: std::result::Result<RunSummary, RunAborted>) {
    match outcome {
        Ok(summary) => tracing::info!(
            "✅ Pass complete: low={} dispatch=[{}] period_records={} window={}",
            summary.low,
            summary.dispatch,
            summary.period_len.map_or("-".into(), |n| n.to_string()),
            summary.window_len.map_or("-".into(), |n| n.to_string()),
        ),
        Err(RunAborted::AccountNotConfigured) => {
            tracing::info!("ℹ️ Set ACCOUNT, PASSWORD, lt_room and ac_room to enable monitoring")
        }
        Err(e) => tracing::error!("❌ Pass aborted: {e}"),
    }
}

async fn run_once(config: &DormwattConfig) {
    match MonitorRun::from_config(config) {
        Ok(run) => log_outcome(run.execute().await),
        Err(e) => tracing::error!("❌ Cannot start pass: {e}"),
    }
}

async fn run_daemon(config: &DormwattConfig, interval: Option<u64>) {
    let run = match MonitorRun::from_config(config) {
        Ok(run) => run,
        Err(e) => {
            tracing::error!("❌ Cannot start daemon: {e}");
            return;
        }
    };
    let run = &run;
    PeriodicRunner::every_secs(interval.unwrap_or(config.monitor.interval_secs))
        .run(|_| async move { log_outcome(run.execute().await) })
        .await;
}

fn init_storage(config: &DormwattConfig) {
    let store = TimeSeriesStore::from_config(&config.storage);
    if let Err(e) = store.init() {
        tracing::error!("❌ Failed to initialize {}: {e}", store.root().display());
    }
}

fn reindex(config: &DormwattConfig) {
    let store = TimeSeriesStore::from_config(&config.storage);
    match store.reindex() {
        Ok(window) => tracing::info!("✅ Reindexed, recent window holds {} record(s)", window.len()),
        Err(e) => tracing::error!("❌ Reindex failed: {e}"),
    }
}

fn print_config(config: &DormwattConfig) -> Result<()> {
    let channels = &config.channel;
    let status = serde_json::json!({
        "account": {
            "configured": config.account.is_configured(),
            "portal_url": config.account.portal_url,
            "lt_room": config.account.lt_room,
            "ac_room": config.account.ac_room,
        },
        "serverchan": {
            "configured": channels.serverchan.is_configured(),
            "keys": channels.serverchan.key_list().len(),
        },
        "email": {
            "configured": channels.email.is_configured(),
            "server": channels.email.smtp_server,
            "port": channels.email.smtp_port,
        },
        "telegram": {
            "configured": channels.telegram.is_configured(),
            "chat_id": channels.telegram.chat_id,
        },
        "storage": {
            "root": config.storage.root_path(),
            "recent_window": config.storage.recent_window,
        },
        "monitor": config.monitor,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "dormwatt=debug,dormwatt_core=debug,dormwatt_channels=debug,dormwatt_scheduler=debug,dormwatt_store=debug,dormwatt_security=debug,dormwatt_monitor=debug"
    } else {
        "dormwatt=info,dormwatt_core=info,dormwatt_channels=info,dormwatt_scheduler=info,dormwatt_store=info,dormwatt_security=info,dormwatt_monitor=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {e}");
            return Ok(());
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_once(&config).await,
        Command::Daemon { interval } => run_daemon(&config, interval).await,
        Command::Init => init_storage(&config),
        Command::Reindex => reindex(&config),
        Command::Config => print_config(&config)?,
    }

    Ok(())
}
