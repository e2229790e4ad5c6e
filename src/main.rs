//! Flood Risk Service - command line front end
//!
//! Subcommands:
//!   monitor     stream device readings (stdin or a file) through the engine
//!   assess      assess a single JSON reading at a location
//!   thresholds  print the configured threshold table
//!
//! Usage:
//!   cargo run --release -- monitor --input readings.log --device-id kch-01
//!   cargo run --release -- assess --reading '{"temperature":95,"humidity":85,"wind_speed":10,"pressure":950}' \
//!       --latitude 1.56 --longitude 110.34
//!
//! Environment:
//!   FLOODRISK_CONFIG - config file path (default: ./floodrisk.toml)
//!   RUST_LOG         - log filter (default: info)

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use floodrisk_service::analysis::history::parse_history_json;
use floodrisk_service::config::EngineConfig;
use floodrisk_service::daemon::{AssessmentOutcome, Monitor, MonitorConfig};
use floodrisk_service::engine::{FloodRiskEngine, RiskAssessment};
use floodrisk_service::ingest::sensor::spawn_line_producer;
use floodrisk_service::model::{Location, Reading};

#[derive(Parser)]
#[command(
    name = "floodrisk",
    about = "Flood risk assessment for field weather devices",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (overrides FLOODRISK_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a stream of device readings
    Monitor {
        /// Input file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,

        /// Device id for CSV lines
        #[arg(long, default_value = "device-0")]
        device_id: String,

        /// Device latitude (defaults to the safe house)
        #[arg(long, requires = "longitude", allow_hyphen_values = true)]
        latitude: Option<f64>,

        /// Device longitude (defaults to the safe house)
        #[arg(long, requires = "latitude", allow_hyphen_values = true)]
        longitude: Option<f64>,

        /// Assessment worker threads
        #[arg(long, default_value = "4")]
        workers: usize,

        /// Emit one JSON assessment per line
        #[arg(long)]
        json: bool,
    },

    /// Assess one reading
    Assess {
        /// Reading as a JSON object
        #[arg(long)]
        reading: String,

        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,

        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,

        /// Historical records (JSON array) to attach window statistics from
        #[arg(long)]
        history: Option<PathBuf>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show the configured threshold table
    Thresholds,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load_default(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Monitor {
            input,
            device_id,
            latitude,
            longitude,
            workers,
            json,
        } => {
            let engine = Arc::new(FloodRiskEngine::from_config(&config)?);
            let location = match (latitude, longitude) {
                (Some(lat), Some(lon)) => Location::new(lat, lon)?,
                _ => engine.safe_house(),
            };
            let reader: Box<dyn BufRead + Send> = match &input {
                Some(path) => Box::new(BufReader::new(
                    File::open(path).with_context(|| format!("opening {}", path.display()))?,
                )),
                None => Box::new(BufReader::new(io::stdin())),
            };

            let (reading_tx, reading_rx) = mpsc::channel();
            let (outcome_tx, outcome_rx) = mpsc::channel::<AssessmentOutcome>();

            let producer = spawn_line_producer(reader, device_id, location, reading_tx);
            let printer = thread::spawn(move || {
                for outcome in outcome_rx {
                    print_outcome(&outcome, json);
                }
            });

            let monitor = Monitor::with_config(engine, MonitorConfig { workers });
            let processed = monitor.run(reading_rx, outcome_tx);

            let sent = producer
                .join()
                .map_err(|_| anyhow::anyhow!("sensor producer thread panicked"))?;
            printer
                .join()
                .map_err(|_| anyhow::anyhow!("output thread panicked"))?;
            tracing::info!(sent, processed, "monitor finished");
        }
        Commands::Assess {
            reading,
            latitude,
            longitude,
            history,
            json,
        } => {
            let engine = FloodRiskEngine::from_config(&config)?;
            let value: serde_json::Value = serde_json::from_str(&reading).context("parsing --reading")?;
            let reading = Reading::from_json(&value)?;
            let location = Location::new(latitude, longitude)?;

            let assessment = match history {
                Some(path) => {
                    let contents = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let records = parse_history_json(&contents)
                        .with_context(|| format!("parsing {}", path.display()))?;
                    engine.assess_with_history(&reading, &location, &records)?
                }
                None => engine.assess(&reading, &location)?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&assessment)?);
            } else {
                print_assessment(&assessment);
            }
        }
        Commands::Thresholds => {
            println!("{:<16} | {:<13} | {:<9} | Limit", "Key", "Field", "Direction");
            println!("{:-<16}-|-{:-<13}-|-{:-<9}-|-{:-<10}", "", "", "", "");
            for t in config.thresholds.iter() {
                println!(
                    "{:<16} | {:<13} | {:<9} | {}",
                    t.key,
                    t.field.as_str(),
                    t.direction.to_string(),
                    t.limit
                );
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &AssessmentOutcome, json: bool) {
    match &outcome.result {
        Ok(assessment) if json => match serde_json::to_string(assessment) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("{} #{}: failed to encode assessment: {}", outcome.device_id, outcome.sequence, e),
        },
        Ok(assessment) => {
            println!("── {} #{}", outcome.device_id, outcome.sequence);
            print_assessment(assessment);
        }
        Err(e) => eprintln!("{} #{}: {}", outcome.device_id, outcome.sequence, e),
    }
}

fn print_assessment(a: &RiskAssessment) {
    let degraded = if a.degraded { " (degraded: no trained model)" } else { "" };
    println!("Location:    {}", a.location);
    println!("Probability: {:.3}{}", a.probability, degraded);
    println!("Risk level:  {}", a.risk_level);

    if a.alerts.is_empty() {
        println!("Alerts:      none");
    } else {
        println!("Alerts:");
        for alert in &a.alerts {
            println!("  ⚠ {}", alert.message);
        }
    }

    if let Some(nav) = &a.navigation {
        println!(
            "Evacuate:    {:.2} km to safe house {}",
            nav.distance_km, nav.destination
        );
        println!("             {}", nav.maps_url);
    }

    if let Some(h) = &a.history {
        println!(
            "History:     {} floods in {} records over {} days (p = {:.2}, rain {:.1}, river {:.2})",
            h.flood_count,
            h.total_records,
            h.window_days,
            h.flood_probability,
            h.average_rainfall,
            h.average_river_level
        );
    }
}
