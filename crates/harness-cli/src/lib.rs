//! ANN harness CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, build, info)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, WorkloadArgs};
pub use commands::{load_settings, rebuild_index, run_workload, show_info, RunSummary};
