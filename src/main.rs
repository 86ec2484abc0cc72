use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use legwatch::log_format::TargetFirstFormat;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "legwatch",
    version,
    about = "Classify ADS-B trace files into zone crossings: departures, arrivals and overflights."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze trace files and write crossings, trajectories and a summary
    Analyze {
        /// Study configuration (default: $LEGWATCH_STUDY_CONFIG, then ./study.toml)
        #[arg(long = "study")]
        study: Option<PathBuf>,

        /// Output directory for the report files
        #[arg(long = "out-dir", default_value = "legwatch-out")]
        out_dir: PathBuf,

        /// Worker threads (default: one per core)
        #[arg(long = "threads")]
        threads: Option<usize>,

        /// Do not write trajectory points
        #[arg(long = "skip-trajectories", default_value_t = false)]
        skip_trajectories: bool,

        /// Write a Prometheus text snapshot of the run's metrics to this file
        #[arg(long = "metrics-file")]
        metrics_file: Option<PathBuf>,

        /// Trace files or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Validate a study configuration and print its zones and windows
    CheckStudy {
        #[arg(long = "study")]
        study: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(TargetFirstFormat)
        .init();
}

fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Analyze {
            study,
            out_dir,
            threads,
            skip_trajectories,
            metrics_file,
            inputs,
        } => commands::handle_analyze(
            study.as_deref(),
            &inputs,
            &out_dir,
            threads,
            skip_trajectories,
            metrics_file.as_deref(),
        ),
        Commands::CheckStudy { study } => commands::handle_check_study(study.as_deref()),
    }
}
