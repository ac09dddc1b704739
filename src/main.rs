mod analysis;
mod config;
mod engine;
mod grid;
mod model;
mod stats;

use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate one replication and write its daily trajectory table.
    Run {
        /// RNG seed; the same seed reproduces a run bit for bit.
        #[arg(long, default_value_t = 12345)]
        seed: u64,

        /// Output table path.
        #[arg(long, default_value = "trajectory-0000.csv")]
        out: PathBuf,

        /// Number of simulated days.
        #[arg(long, default_value_t = 730)]
        days: u32,

        /// TOML parameter file; reference parameters when absent.
        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Merge replicated trajectories and extract epidemic peaks.
    Analyze {
        /// Directory holding the replication tables.
        #[arg(long)]
        data_dir: PathBuf,

        /// Glob pattern selecting replication tables inside the directory.
        #[arg(long, default_value = "trajectory-*.csv")]
        pattern: String,
    },
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    match args.command {
        Command::Run {
            seed,
            out,
            days,
            params,
        } => {
            let cfg = match params {
                Some(file) => Config::from_file(file).context("failed to construct cfg")?,
                None => Config::default(),
            };
            log::info!("{cfg:#?}");

            let mut engine = Engine::generate_initial_population(cfg, seed)
                .context("failed to generate initial population")?;

            engine.run(days, out).context("failed to run simulation")?;
        }
        Command::Analyze { data_dir, pattern } => {
            analysis::run_analysis(&data_dir, &pattern).context("failed to run analysis")?;
        }
    }

    Ok(())
}
