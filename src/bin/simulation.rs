//! Tank water-quality simulation
//!
//! Generates simulated sensor readings for AquaWatch testing and replay.
//! Readings go to stdout (JSON lines or CSV); the mission log and the final
//! summary go to stderr.
//!
//! # Usage
//! ```bash
//! ./simulation --hours 24 --tanks 1,2 --seed 42 --format csv > day.csv
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, FixedOffset, Utc};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use aquawatch::config::defaults::MINUTES_PER_DAY;
use aquawatch::config::AquaConfig;
use aquawatch::severity::{aggregate, Severity};
use aquawatch::simulation::SimulationEngine;
use aquawatch::Reading;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "aquawatch-simulation")]
#[command(about = "Tank water-quality simulation for AquaWatch testing")]
#[command(version)]
struct Args {
    /// Simulated duration in hours (1-168)
    #[arg(short = 'H', long, default_value = "24", value_parser = clap::value_parser!(u32).range(1..=168))]
    hours: u32,

    /// Tank ids to simulate (default: every configured tank)
    #[arg(short, long, value_delimiter = ',')]
    tanks: Vec<u32>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Minute of day of the first tick (0-1439)
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u32).range(0..1440))]
    start_minute: u32,

    /// Config file (default: AQUAWATCH_CONFIG, ./aquawatch.toml, built-in)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Suppress mission log (only output sensor data)
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Output
// ============================================================================

#[derive(Serialize)]
struct OutputRow<'a> {
    #[serde(flatten)]
    reading: &'a Reading,
    severity: Severity,
}

fn write_csv_row(out: &mut impl Write, reading: &Reading, severity: Severity) -> io::Result<()> {
    writeln!(
        out,
        "{},{},{:.3},{:.3},{:.3},{:.3},{}",
        reading.timestamp().to_rfc3339(),
        reading.tank_id(),
        reading.temperature(),
        reading.ph(),
        reading.oxygen(),
        reading.turbidity(),
        severity
    )
}

fn log_mission(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AquaConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AquaConfig::default(),
    };
    let tanks: Vec<u32> = if args.tanks.is_empty() {
        config.tanks.iter().filter(|t| t.active).map(|t| t.id).collect()
    } else {
        args.tanks.clone()
    };

    let engine = SimulationEngine::from_config(&config, args.seed);
    let tick_secs = config.simulation.tick_interval_secs.max(1);
    let total_ticks = u64::from(args.hours) * 3600 / tick_secs;

    let offset = config.farm.offset();
    let midnight = Utc::now()
        .with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .context("Failed to resolve local midnight")?;
    let start = midnight + Duration::minutes(i64::from(args.start_minute % MINUTES_PER_DAY));
    let step = Duration::seconds(i64::try_from(tick_secs).unwrap_or(i64::MAX));

    log_mission(&"=".repeat(60), args.quiet);
    log_mission("AQUAWATCH TANK SIMULATION", args.quiet);
    log_mission(&"=".repeat(60), args.quiet);
    log_mission(&format!("  Tanks: {tanks:?}"), args.quiet);
    log_mission(
        &format!("  Duration: {} hours ({} ticks of {} s)", args.hours, total_ticks, tick_secs),
        args.quiet,
    );
    log_mission(&format!("  Start: {start}"), args.quiet);
    log_mission(&format!("  Seed: {}", engine.seed()), args.quiet);
    log_mission(&"=".repeat(60), args.quiet);

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    if args.format == OutputFormat::Csv {
        writeln!(out, "timestamp,tank_id,temperature,ph,oxygen,turbidity,severity")?;
    }

    let mut counts: BTreeMap<u32, [u64; 3]> = BTreeMap::new();
    let mut at: chrono::DateTime<FixedOffset> = start;
    for _ in 0..total_ticks {
        for reading in engine.step_many(&tanks, at) {
            let severity = aggregate(&reading, &config.thresholds);
            counts.entry(reading.tank_id()).or_default()[severity as usize] += 1;
            match args.format {
                OutputFormat::Json => {
                    let row = OutputRow {
                        reading: &reading,
                        severity,
                    };
                    serde_json::to_writer(&mut out, &row)?;
                    writeln!(out)?;
                }
                OutputFormat::Csv => write_csv_row(&mut out, &reading, severity)?,
            }
        }
        at += step;
    }
    out.flush()?;

    log_mission("", args.quiet);
    log_mission("SUMMARY (ticks per severity)", args.quiet);
    for (tank_id, [normal, warning, critical]) in &counts {
        log_mission(
            &format!("  Tank {tank_id}: NORMAL {normal} | WARNING {warning} | CRITICAL {critical}"),
            args.quiet,
        );
    }
    Ok(())
}
