//! Skirmish development tools.
//!
//! # Usage
//!
//! ```bash
//! # Check rules and every scenario under data/
//! cargo run -p skirmish_tools -- validate data
//!
//! # Run the 1v1 for a minute of game time and keep the replay
//! cargo run -p skirmish_tools -- run data/scenarios/skirmish_1v1.ron --ticks 900 --record 1v1.replay
//!
//! # Check a replay still reproduces its final hash
//! cargo run -p skirmish_tools -- verify-replay 1v1.replay
//! ```
//!
//! Summaries go to stdout as JSON; logs go to stderr and honor `RUST_LOG`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_tools::run::{run_scenario, verify_replay, RunOptions};
use skirmish_tools::validate::{validate_data_directory, RULES_FILE};
use skirmish_tools::{ToolError, ToolResult};

#[derive(Parser)]
#[command(name = "skirmish-tools")]
#[command(about = "Development tools for the skirmish simulation")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate data files
    Validate {
        /// Path to data directory
        #[arg(default_value = "data")]
        path: PathBuf,
    },

    /// Run a scenario headless and print a summary
    Run {
        /// Scenario file to load
        scenario: PathBuf,

        /// Rules file
        #[arg(short, long, default_value = "data/rules.ron")]
        rules: PathBuf,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "900")]
        ticks: u64,

        /// Write a replay of the run to this path
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Replay a recording and check its final hash
    VerifyReplay {
        /// Replay file path
        file: PathBuf,

        /// Rules file the replay was recorded with
        #[arg(short, long, default_value = "data/rules.ron")]
        rules: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the JSON summary
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Commands) -> ToolResult<()> {
    match command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {}", path.display());
            let report = validate_data_directory(&path)?;
            print_json(&report)?;
            if report.is_ok() {
                tracing::info!("Validation passed");
                Ok(())
            } else {
                Err(ToolError::Invalid {
                    count: report.problems.len(),
                })
            }
        }
        Commands::Run {
            scenario,
            rules,
            ticks,
            record,
        } => {
            let summary = run_scenario(&RunOptions {
                scenario,
                rules,
                ticks,
                record,
            })?;
            print_json(&summary)
        }
        Commands::VerifyReplay { file, rules } => {
            let rules = if rules.is_dir() { rules.join(RULES_FILE) } else { rules };
            let summary = verify_replay(&file, &rules)?;
            tracing::info!("Replay verified");
            print_json(&summary)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> ToolResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
