//! floorfuse - command-line entry point
//!
//! Reads a JSON document of raw detector records, fuses them into one floor
//! plan and writes the fused result, confidence report and measurements as
//! JSON.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::Parser;
use floorfuse::config::{ConflictPolicy, FileConfig, VotingStrategy};
use floorfuse::scale::KnownDimension;
use floorfuse::{FusionEngine, RawDetection, ScaleHints};
use floorfuse_common::config::{load_toml_config, write_toml_config};
use floorfuse_common::{ConfigResolver, LoggingConfig};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for floorfuse
#[derive(Parser, Debug)]
#[command(name = "floorfuse")]
#[command(about = "Fuse floor plan detections from multiple recognisers")]
#[command(version)]
struct Args {
    /// JSON file with detector records (array, or object with `detections`)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// TOML configuration file (otherwise $FLOORFUSE_CONFIG or the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Voting strategy (majority, weighted, confidence, bayesian, consensus)
    #[arg(long)]
    strategy: Option<String>,

    /// Conflict resolution policy (highest_confidence, consensus, external_arbitration, manual)
    #[arg(long)]
    resolution: Option<String>,

    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Write the default configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

/// Input document: a bare array of records or an object with scale hints
#[derive(Deserialize)]
#[serde(untagged)]
enum InputDocument {
    Detections(Vec<RawDetection>),
    Plan {
        detections: Vec<RawDetection>,
        #[serde(default)]
        grid_lines: Vec<f64>,
        #[serde(default)]
        known_dimensions: Vec<KnownDimension>,
    },
}

impl InputDocument {
    fn into_parts(self) -> (Vec<RawDetection>, ScaleHints) {
        match self {
            InputDocument::Detections(detections) => (detections, ScaleHints::default()),
            InputDocument::Plan {
                detections,
                grid_lines,
                known_dimensions,
            } => (
                detections,
                ScaleHints {
                    grid_lines,
                    known_dimensions,
                },
            ),
        }
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    // stdout may carry the JSON result, so console logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn read_input(path: &Path) -> Result<InputDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse input {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        write_toml_config(&FileConfig::default(), path)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    // Step 1: Resolve and load configuration
    let config_path = ConfigResolver::new("floorfuse").resolve(args.config.as_deref());
    let file_config: FileConfig =
        load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;

    init_logging(&file_config.logging)?;
    info!("Starting floorfuse {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Configuration: {}", path.display());
    }

    // Step 2: Apply command-line overrides
    let mut config = file_config.fusion;
    if let Some(strategy) = &args.strategy {
        config.voting_strategy = strategy
            .parse::<VotingStrategy>()
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }
    if let Some(policy) = &args.resolution {
        config.conflict_resolution = policy
            .parse::<ConflictPolicy>()
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }

    let Some(input) = &args.input else {
        bail!("--input is required");
    };
    let (detections, hints) = read_input(input)?.into_parts();
    info!("Read {} detector records from {}", detections.len(), input.display());

    // Step 3: Fuse and measure
    let engine = FusionEngine::new(config).context("Invalid fusion configuration")?;
    let outcome = engine.fuse_raw(detections).await.context("Fusion failed")?;
    let measurements = engine.measure(&outcome, hints);
    info!("{}", outcome.report.summary_message());

    let document = json!({
        "result": outcome.result,
        "report": outcome.report,
        "validation": outcome.validation,
        "scale": measurements.scale,
        "areas": measurements.rooms,
        "summary": measurements.summary,
        "dropped_sources": outcome.dropped_sources,
    });
    let text = if args.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Output written to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
