//! CLI argument parsing for the ANN harness.
//!
//! CLI flags override all other config sources.

use clap::{Args, Parser, Subcommand};

use harness_types::Settings;

/// ANN harness
///
/// Parallel build and filtered k-NN query runs over an HNSW index.
#[derive(Parser, Debug)]
#[command(name = "ann-harness")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/ann-harness/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Harness commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the index if missing, then run the filtered query batch
    Run {
        #[command(flatten)]
        workload: WorkloadArgs,

        /// Print every result row as label:distance pairs
        #[arg(long)]
        print_results: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the index from scratch, replacing any saved copy
    Build {
        #[command(flatten)]
        workload: WorkloadArgs,
    },

    /// Show resolved settings and the index file location
    Info {
        #[command(flatten)]
        workload: WorkloadArgs,
    },
}

/// Per-run overrides for settings
#[derive(Args, Debug, Clone, Default)]
pub struct WorkloadArgs {
    /// Worker threads (0 = one per hardware thread)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Vector dimension
    #[arg(long)]
    pub dimension: Option<usize>,

    /// Number of vectors to index
    #[arg(long)]
    pub max_elements: Option<usize>,

    /// Neighbors per query
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Number of query rows
    #[arg(short, long)]
    pub queries: Option<usize>,

    /// Only return labels divisible by this value
    #[arg(long)]
    pub divisor: Option<u64>,

    /// Query-time search depth (ef)
    #[arg(long)]
    pub ef_search: Option<usize>,

    /// Seed for synthetic vectors
    #[arg(long)]
    pub seed: Option<u64>,

    /// Index file path
    #[arg(long)]
    pub index_path: Option<String>,
}

impl WorkloadArgs {
    /// Apply every flag that was given on top of `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(threads) = self.threads {
            settings.num_threads = threads;
        }
        if let Some(dimension) = self.dimension {
            settings.dimension = dimension;
        }
        if let Some(max_elements) = self.max_elements {
            settings.max_elements = max_elements;
        }
        if let Some(k) = self.k {
            settings.k = k;
        }
        if let Some(queries) = self.queries {
            settings.query_count = queries;
        }
        if let Some(divisor) = self.divisor {
            settings.filter_divisor = divisor;
        }
        if let Some(ef_search) = self.ef_search {
            settings.expansion_search = ef_search;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if let Some(path) = &self.index_path {
            settings.index_path = Some(path.clone());
        }
    }
}
