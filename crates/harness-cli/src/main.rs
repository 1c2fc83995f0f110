//! ANN harness
//!
//! Builds (or loads) an HNSW index over synthetic vectors and runs a batch
//! of filtered k-NN queries against it in parallel.
//!
//! # Usage
//!
//! ```bash
//! ann-harness run [--threads N] [--k K] [--queries N] [--divisor D]
//! ann-harness build [--threads N]
//! ann-harness info
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/ann-harness/config.toml)
//! 3. Environment variables (ANN_HARNESS_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use harness_cli::{rebuild_index, run_workload, show_info, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Run {
            workload,
            print_results,
            json,
        } => {
            run_workload(config, log_level, &workload, print_results, json)?;
        }
        Commands::Build { workload } => {
            rebuild_index(config, log_level, &workload)?;
        }
        Commands::Info { workload } => {
            show_info(config, &workload)?;
        }
    }

    Ok(())
}
