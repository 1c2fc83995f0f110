//! Command implementations for the ANN harness.
//!
//! Handles:
//! - run: generate vectors, build or load the index, run the filtered
//!   query batch, validate and report
//! - build: drop any saved index and build it again
//! - info: show resolved settings

use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use harness_executor::ParallelExecutor;
use harness_types::Settings;
use harness_vector::{
    build_or_load, run_filtered_queries, verify_predicate, verify_self_matches, DivisibleBy,
    FilteredIndex, HnswConfig, HnswIndex, IndexOrigin, QueryBatch, VectorSet,
};

use crate::cli::WorkloadArgs;

/// Load settings (defaults -> file -> env) and apply CLI overrides.
pub fn load_settings(config_path: Option<&str>, workload: &WorkloadArgs) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    workload.apply(&mut settings);
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

fn init_tracing(settings: &Settings, log_level_override: Option<&str>) -> Result<()> {
    let level = log_level_override.unwrap_or(&settings.log_level);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn hnsw_config(settings: &Settings) -> HnswConfig {
    HnswConfig::new(settings.dimension, settings.max_elements)
        .with_connectivity(settings.connectivity)
        .with_expansion(settings.expansion_add, settings.expansion_search)
}

/// Outcome of one `run`, printed at the end.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Whether this run built the index
    pub built: bool,
    /// Build time, when built
    pub build_ms: Option<u64>,
    pub search_ms: u64,
    pub queries: usize,
    pub k: usize,
    pub divisor: u64,
    /// Rows with fewer than k hits
    pub short_rows: usize,
    /// Labels returned that the filter rejects
    pub predicate_violations: usize,
    /// Eligible rows that did not return themselves first
    pub self_match_misses: usize,
    /// Queries answered per worker
    pub per_worker: Vec<usize>,
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Build or load the index, run the query batch and report.
///
/// Fails if any returned label violates the filter.
pub fn run_workload(
    config_path: Option<&str>,
    log_level: Option<&str>,
    workload: &WorkloadArgs,
    print_results: bool,
    json: bool,
) -> Result<RunSummary> {
    let settings = load_settings(config_path, workload)?;
    init_tracing(&settings, log_level)?;

    let summary = execute(&settings, print_results)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.predicate_violations > 0 {
        bail!(
            "{} returned labels failed the divisible-by-{} filter",
            summary.predicate_violations,
            summary.divisor
        );
    }
    Ok(summary)
}

/// Workload body without process-global setup, so tests can drive it.
pub fn execute(settings: &Settings, print_results: bool) -> Result<RunSummary> {
    let executor = ParallelExecutor::with_threads(settings.num_threads);
    let path = settings.index_file();

    info!(
        started_at = %Utc::now().to_rfc3339(),
        dimension = settings.dimension,
        elements = settings.max_elements,
        workers = %executor.workers(),
        "Generating vectors"
    );
    let vectors = VectorSet::uniform(settings.dimension, settings.max_elements, settings.seed)?;

    let (index, origin) =
        build_or_load::<HnswIndex>(&hnsw_config(settings), &path, &vectors, &executor)
            .with_context(|| format!("Failed to build or load index at {}", path.display()))?;

    let predicate = DivisibleBy::new(settings.filter_divisor)?;
    let queries = vectors.head(settings.query_count);
    let run = run_filtered_queries(&index, &queries, settings.k, &predicate, &executor)
        .context("Query batch failed")?;

    if print_results {
        print_rows(&run.batch);
    }

    let violations = verify_predicate(&run.batch, &predicate);
    let misses = verify_self_matches(&run.batch, &predicate);

    let build_ms = match origin {
        IndexOrigin::Built { elapsed, .. } => Some(millis(elapsed)),
        IndexOrigin::Loaded => None,
    };

    Ok(RunSummary {
        built: build_ms.is_some(),
        build_ms,
        search_ms: millis(run.elapsed),
        queries: run.batch.rows(),
        k: run.batch.k(),
        divisor: predicate.divisor(),
        short_rows: run.batch.short_rows().len(),
        predicate_violations: violations.len(),
        self_match_misses: misses.len(),
        per_worker: run.per_worker,
    })
}

fn print_rows(batch: &QueryBatch) {
    for row in 0..batch.rows() {
        let line: Vec<String> = batch
            .row(row)
            .map(|hit| format!("{}:{}", hit.label, hit.distance))
            .collect();
        println!("{}", line.join(","));
        println!("====");
    }
}

fn print_summary(summary: &RunSummary) {
    match summary.build_ms {
        Some(ms) => println!("Index build elapsed(ms)={}", ms),
        None => println!("Index loaded from disk"),
    }
    println!(
        "Search elapsed(ms)={} queries:{} k:{}",
        summary.search_ms, summary.queries, summary.k
    );
    println!("Short rows: {}", summary.short_rows);
    println!("Self-match misses: {}", summary.self_match_misses);
    println!("Filter violations: {}", summary.predicate_violations);
}

/// Delete any saved index for these settings and build it again.
pub fn rebuild_index(
    config_path: Option<&str>,
    log_level: Option<&str>,
    workload: &WorkloadArgs,
) -> Result<()> {
    let settings = load_settings(config_path, workload)?;
    init_tracing(&settings, log_level)?;

    let inserted = rebuild(&settings)?;
    println!(
        "Built index with {} vectors at {}",
        inserted,
        settings.index_file().display()
    );
    Ok(())
}

/// Rebuild body without process-global setup. Returns the vector count.
pub fn rebuild(settings: &Settings) -> Result<usize> {
    let path = settings.index_file();
    if path.exists() {
        info!(path = ?path, "Removing saved index");
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }

    let executor = ParallelExecutor::with_threads(settings.num_threads);
    let vectors = VectorSet::uniform(settings.dimension, settings.max_elements, settings.seed)?;
    let (index, _origin) =
        build_or_load::<HnswIndex>(&hnsw_config(settings), &path, &vectors, &executor)
            .with_context(|| format!("Failed to build index at {}", path.display()))?;
    Ok(index.len())
}

/// Print resolved settings and whether the index file exists.
pub fn show_info(config_path: Option<&str>, workload: &WorkloadArgs) -> Result<()> {
    let settings = load_settings(config_path, workload)?;
    let path = settings.index_file();

    println!("{}", settings.to_json_pretty()?);
    println!("Index file: {}", path.display());
    println!("Index present: {}", path.exists());
    println!(
        "Worker threads: {}",
        ParallelExecutor::with_threads(settings.num_threads)
            .workers()
            .resolve()
    );
    Ok(())
}
