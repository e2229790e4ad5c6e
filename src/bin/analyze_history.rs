//! Historical Flood Analysis
//!
//! Summarizes a flood record file for one location: windowed statistics
//! (flood frequency, mean rainfall and river level) and the record list,
//! newest first.
//!
//! Usage:
//!   cargo run --bin analyze_history -- --records data/sarawak_history.json \
//!       --latitude 1.56 --longitude 110.34 --window-days 365
//!
//! Options:
//!   --as-of DATE       Evaluate the window as of DATE (YYYY-MM-DD) instead of today
//!   --radius-km KM     Match records within KM instead of exact coordinates
//!   --json             Print statistics as JSON

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;

use floodrisk_service::analysis::history::{HistoricalAggregator, LocationMatch, parse_history_json};
use floodrisk_service::config::EngineConfig;
use floodrisk_service::model::Location;

#[derive(Parser)]
#[command(name = "analyze_history", about = "Windowed flood statistics for a location", version)]
struct Args {
    /// Historical records (JSON array)
    #[arg(long)]
    records: PathBuf,

    #[arg(long, allow_hyphen_values = true)]
    latitude: f64,

    #[arg(long, allow_hyphen_values = true)]
    longitude: f64,

    /// Window length; defaults to `[history] window_days`
    #[arg(long)]
    window_days: Option<u32>,

    /// Window end date (YYYY-MM-DD); defaults to today (UTC)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Radius match; defaults to the configured policy
    #[arg(long)]
    radius_km: Option<f64>,

    /// Config file (overrides FLOODRISK_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = EngineConfig::load_default(args.config.as_deref()).context("loading configuration")?;

    let location = Location::new(args.latitude, args.longitude)?;
    let window_days = args.window_days.unwrap_or(config.history_window_days);
    let matching = match args.radius_km {
        Some(r) if r.is_finite() && r >= 0.0 => LocationMatch::WithinKm { radius_km: r },
        Some(r) => anyhow::bail!("--radius-km must be a non-negative number, got {}", r),
        None => config.location_match,
    };
    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let contents = std::fs::read_to_string(&args.records)
        .with_context(|| format!("reading {}", args.records.display()))?;
    let records = parse_history_json(&contents)
        .with_context(|| format!("parsing {}", args.records.display()))?;

    let aggregator = HistoricalAggregator::new(matching);
    let stats = aggregator.aggregate_as_of(&records, &location, window_days, as_of);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("🌊 Historical Flood Analysis");
    println!("============================\n");
    println!("Location:      {}", location);
    println!("Window:        {} to {} ({} days)", stats.window_start, stats.as_of, stats.window_days);
    println!("Records:       {}", stats.total_records);
    println!("Floods:        {}", stats.flood_count);
    println!("Flood rate:    {:.1}%", stats.flood_probability * 100.0);
    println!("Mean rainfall: {:.1} mm", stats.average_rainfall);
    println!("Mean river:    {:.2} m\n", stats.average_river_level);

    let history = aggregator.location_history(&records, &location);
    if history.is_empty() {
        println!("No records at this location.");
        return Ok(());
    }

    println!("{:<12} | {:<5} | {:>8} | {:>6} | Areas", "Date", "Flood", "Rain", "River");
    println!("{:-<12}-|-{:-<5}-|-{:-<8}-|-{:-<6}-|-{:-<20}", "", "", "", "", "");
    for r in history {
        let fmt_opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v));
        println!(
            "{:<12} | {:<5} | {:>8} | {:>6} | {}",
            r.date,
            if r.flood_occurred { "yes" } else { "no" },
            fmt_opt(r.rainfall),
            fmt_opt(r.river_level),
            r.affected_areas.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
