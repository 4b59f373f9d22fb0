use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use motion_stage_core::{AnimationManager, AnimationSnapshot, AppConfig, Expr};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod script;

fn main() -> motion_stage_core::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    init_tracing(&config.log_filter);

    match cli.command {
        Commands::Run { script } => run_script(&script, &config),
        Commands::Check { expression } => run_check(&expression),
        Commands::Timeline { snapshot } => run_timeline(&snapshot),
    }
}

fn run_script(path: &Path, config: &AppConfig) -> motion_stage_core::Result<()> {
    tracing::info!(?path, frame_rate = config.playback.frame_rate, "running script");
    let json = std::fs::read_to_string(path)?;
    let script: script::Script = serde_json::from_str(&json)?;
    let report = script::run_script(&script, config.playback.clone())?;
    print_json(&report)
}

#[derive(Debug, Serialize)]
struct CheckReport {
    trackers: Vec<String>,
    variables: Vec<String>,
    /// Present when the expression reads no trackers or variables.
    value: Option<f64>,
}

fn run_check(expression: &str) -> motion_stage_core::Result<()> {
    let expr = Expr::parse(expression)?;
    let trackers: Vec<String> = expr.tracker_refs().into_iter().collect();
    let variables: Vec<String> = expr.variables().into_iter().collect();
    let value = if trackers.is_empty() && variables.is_empty() {
        let env: HashMap<String, f64> = HashMap::new();
        Some(expr.eval(&env)?)
    } else {
        None
    };
    print_json(&CheckReport {
        trackers,
        variables,
        value,
    })
}

/// Loads a timeline snapshot, repairs it and prints the resulting steps.
fn run_timeline(path: &Path) -> motion_stage_core::Result<()> {
    tracing::info!(?path, "loading timeline snapshot");
    let snapshot = AnimationSnapshot::from_json(&std::fs::read_to_string(path)?)?;
    let mut timeline = AnimationManager::new();
    timeline.load_from_obj(snapshot);
    print_json(&timeline.get_groups_with_meta())
}

fn print_json<T: Serialize>(value: &T) -> motion_stage_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Tracker network and animation timeline runner", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON scene script and print the final state.
    Run {
        /// Path to the script file.
        script: PathBuf,
    },
    /// Parse an expression and list the trackers it reads.
    Check {
        /// Right-hand side of a tracker expression, e.g. `[t] * 2 + 1`.
        expression: String,
    },
    /// Load a timeline snapshot and print its steps after repair.
    Timeline {
        /// Path to the snapshot file.
        snapshot: PathBuf,
    },
}
