//! AquaWatch monitoring daemon.
//!
//! Simulates every configured tank, raises and resolves water-quality alerts
//! and periodically writes feed plans.
//!
//! # Usage
//!
//! ```bash
//! # Run until Ctrl+C with ./aquawatch.toml (or defaults), sled under ./aquawatch_data
//! ./aquawatch
//!
//! # One simulated day at 30 s ticks, as fast as possible, nothing persisted
//! ./aquawatch --in-memory --ticks 2880 --interval-ms 1 --seed 7
//! ```
//!
//! # Environment Variables
//!
//! - `AQUAWATCH_CONFIG`: config file path (default: ./aquawatch.toml)
//! - `RUST_LOG`: logging level (default: info)
//! - `RESET_DB`: set to "true" to wipe the data directory on startup

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aquawatch::alerting::AlertMonitor;
use aquawatch::config::AquaConfig;
use aquawatch::feeding::{build_pool, FeedAdvisor};
use aquawatch::pipeline::{resume_after, LoopServices, LoopSettings, MonitoringLoop};
use aquawatch::simulation::SimulationEngine;
use aquawatch::storage::{
    AlertRepository, FeedPlanRepository, InMemoryStore, SensorRepository, SledStore,
    TankRepository,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "aquawatch")]
#[command(about = "AquaWatch aquaculture water-quality monitor")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides AQUAWATCH_CONFIG and ./aquawatch.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// sled data directory (overrides monitor.data_dir)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Simulation seed (overrides simulation.seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Wall-clock milliseconds between ticks
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: u64,

    /// Keep everything in memory instead of sled
    #[arg(long)]
    in_memory: bool,

    /// Wipe the data directory before starting.
    /// Can also be set via RESET_DB=true environment variable.
    #[arg(long)]
    reset_db: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Database Reset
// ============================================================================

/// Check if a reset is requested via CLI flag or environment variable.
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var("RESET_DB") {
        let val_lower = val.to_lowercase();
        return val_lower == "true" || val_lower == "1" || val_lower == "yes";
    }
    false
}

fn reset_data_directory(data_path: &Path) -> Result<()> {
    if !data_path.exists() {
        info!("Data directory does not exist, nothing to reset");
        return Ok(());
    }
    warn!(path = %data_path.display(), "RESET_DB set, wiping persistent data");
    std::fs::remove_dir_all(data_path)
        .with_context(|| format!("Failed to remove data directory {}", data_path.display()))?;
    Ok(())
}

// ============================================================================
// Repositories
// ============================================================================

/// One backend viewed through each repository trait.
struct Repositories {
    tanks: Arc<dyn TankRepository>,
    sensors: Arc<dyn SensorRepository>,
    alerts: Arc<dyn AlertRepository>,
    plans: Arc<dyn FeedPlanRepository>,
}

impl Repositories {
    fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TankRepository + SensorRepository + AlertRepository + FeedPlanRepository + 'static,
    {
        Self {
            tanks: backend.clone(),
            sensors: backend.clone(),
            alerts: backend.clone(),
            plans: backend,
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = match &args.config {
        Some(path) => AquaConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AquaConfig::load(),
    };

    if args.print_config {
        println!("{}", config.to_toml().context("Failed to serialize config")?);
        return Ok(());
    }

    info!(
        farm = %config.farm.name,
        tanks = config.tanks.len(),
        tick_secs = config.simulation.tick_interval_secs,
        ga = config.feeding.use_genetic_optimizer,
        "AquaWatch starting"
    );

    let mut sled_store: Option<Arc<SledStore>> = None;
    let repos = if args.in_memory {
        info!("Using in-memory repositories");
        Repositories::from_backend(Arc::new(InMemoryStore::new()))
    } else {
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.monitor.data_dir));
        if should_reset_db(args.reset_db) {
            reset_data_directory(&data_dir)?;
        }
        let store = Arc::new(
            SledStore::open(&data_dir)
                .with_context(|| format!("Failed to open sled store at {}", data_dir.display()))?,
        );
        info!(path = %data_dir.display(), readings = store.reading_count(), "sled store opened");
        sled_store = Some(Arc::clone(&store));
        Repositories::from_backend(store)
    };

    for tank in config.tank_records() {
        repos
            .tanks
            .upsert(&tank)
            .with_context(|| format!("Failed to register tank {}", tank.id))?;
    }
    let tank_ids: Vec<u32> = repos
        .tanks
        .list()
        .context("Failed to list tanks")?
        .into_iter()
        .filter(|t| t.active)
        .map(|t| t.id)
        .collect();
    info!(?tank_ids, "active tanks");

    let engine = Arc::new(SimulationEngine::from_config(&config, args.seed));
    info!(seed = engine.seed(), "simulation seeded");

    let monitor = Arc::new(AlertMonitor::new(
        config.thresholds.clone(),
        Arc::clone(&repos.sensors),
        Arc::clone(&repos.alerts),
    ));
    let advisor = Arc::new(
        FeedAdvisor::new(
            &config,
            Arc::clone(&repos.tanks),
            Arc::clone(&repos.sensors),
            Arc::clone(&repos.plans),
        )
        .context("Invalid optimizer configuration")?,
    );
    let pool = Arc::new(
        build_pool(config.monitor.optimizer_threads).context("Failed to build optimizer pool")?,
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let now = Utc::now();
    let mut settings = LoopSettings::from_config(
        &config,
        Duration::from_millis(args.interval_ms),
        now.with_timezone(&config.farm.offset()),
        args.ticks,
    );
    // The simulated clock outruns wall time; never restart behind stored data
    let start = resume_after(repos.sensors.as_ref(), &tank_ids, now, settings.sim_step)
        .context("Failed to read stored readings")?;
    if start > now {
        info!(start = %start, "resuming simulated clock after stored readings");
    }
    settings.start = start.with_timezone(&config.farm.offset());
    let services = LoopServices {
        engine,
        monitor,
        advisor,
        sensors: repos.sensors,
        alerts: repos.alerts,
        pool,
    };
    let stats = MonitoringLoop::new(services, tank_ids, settings, cancel_token)
        .run()
        .await;

    if let Some(store) = sled_store {
        store.flush().context("Failed to flush sled store")?;
        info!(
            readings = store.reading_count(),
            open_alerts = store.open_alert_count(),
            bytes = store.size_bytes(),
            "sled store flushed"
        );
    }
    info!(errors = stats.errors, "AquaWatch stopped");
    Ok(())
}
