//! Build-or-load lifecycle and batched filtered queries.
//!
//! Population and querying both run through a [`ParallelExecutor`]: one
//! task per vector to insert, one task per query row to search. The index
//! is shared by reference across workers; query rows land in a
//! [`ResultBuffer`] that is read only after the executor has joined.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use harness_executor::ParallelExecutor;
use tracing::{error, info, warn};

use crate::error::VectorError;
use crate::hnsw::HnswConfig;
use crate::index::{FilteredIndex, Label, PersistentIndex};
use crate::predicate::LabelPredicate;
use crate::results::{QueryBatch, ResultBuffer};
use crate::vectors::VectorSet;

/// How the index returned by [`build_or_load`] came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// No saved index was found; one was built, saved and reloaded
    Built { inserted: usize, elapsed: Duration },
    /// A saved index was found and loaded
    Loaded,
}

/// Insert vector `i` under label `i` for every row of `vectors`.
///
/// Returns the number of vectors inserted. The first failed insert aborts
/// the run.
pub fn populate<I>(
    index: &I,
    vectors: &VectorSet,
    executor: &ParallelExecutor,
) -> Result<usize, VectorError>
where
    I: FilteredIndex + ?Sized,
{
    if vectors.dimension() != index.dimension() {
        return Err(VectorError::DimensionMismatch {
            expected: index.dimension(),
            actual: vectors.dimension(),
        });
    }

    executor.run(0..vectors.len(), |row, _worker| {
        index.insert(row as Label, vectors.row(row))
    })?;
    Ok(vectors.len())
}

/// Open the index saved at `path`, building and saving it first if absent.
///
/// Both paths finish by loading from `path`, so the caller always gets an
/// index restored from disk. The index reserves at least one thread context
/// per executor worker.
pub fn build_or_load<I>(
    config: &HnswConfig,
    path: &Path,
    vectors: &VectorSet,
    executor: &ParallelExecutor,
) -> Result<(I, IndexOrigin), VectorError>
where
    I: PersistentIndex,
{
    let config = config.clone().for_workers(executor.workers());
    let origin = if path.exists() {
        info!(path = ?path, "Saved index found, skipping build");
        IndexOrigin::Loaded
    } else {
        info!(
            path = ?path,
            elements = vectors.len(),
            workers = %executor.workers(),
            "Starting index build"
        );
        let started = Instant::now();

        let index = I::create(&config)?;
        let inserted = populate(&index, vectors, executor)?;
        let elapsed = started.elapsed();
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            docs = inserted,
            "Index build complete"
        );

        index.save(path)?;
        IndexOrigin::Built { inserted, elapsed }
    };

    let index = I::load(&config, path)?;
    Ok((index, origin))
}

/// Output of [`run_filtered_queries`].
#[derive(Debug, Clone)]
pub struct QueryRun {
    /// Per-row results
    pub batch: QueryBatch,
    /// Wall time of the whole batch
    pub elapsed: Duration,
    /// Queries answered by each worker slot
    pub per_worker: Vec<usize>,
}

/// Search every row of `queries` for its `k` nearest labels that pass
/// `predicate`.
///
/// Any failed search aborts the batch; partial results are discarded.
pub fn run_filtered_queries<I, P>(
    index: &I,
    queries: &VectorSet,
    k: usize,
    predicate: &P,
    executor: &ParallelExecutor,
) -> Result<QueryRun, VectorError>
where
    I: FilteredIndex + ?Sized,
    P: LabelPredicate,
{
    if k == 0 {
        return Err(VectorError::Config("k must be > 0".to_string()));
    }
    if queries.dimension() != index.dimension() {
        return Err(VectorError::DimensionMismatch {
            expected: index.dimension(),
            actual: queries.dimension(),
        });
    }

    let buffer = ResultBuffer::new(queries.len(), k);
    let answered: Vec<AtomicUsize> = (0..executor.workers().resolve())
        .map(|_| AtomicUsize::new(0))
        .collect();

    let started = Instant::now();
    executor.run(0..queries.len(), |row, worker| -> Result<(), VectorError> {
        let hits = index.search_filtered(queries.row(row), k, predicate)?;
        buffer.write_row(row, &hits)?;
        if let Some(count) = answered.get(worker) {
            count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })?;
    let elapsed = started.elapsed();

    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        queries = queries.len(),
        k,
        "Query batch complete"
    );

    Ok(QueryRun {
        batch: buffer.into_batch(),
        elapsed,
        per_worker: answered.into_iter().map(AtomicUsize::into_inner).collect(),
    })
}

/// A returned label the predicate rejects.
///
/// The index promised to filter, so this points at the index, not at the
/// query harness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredicateViolation {
    pub row: usize,
    pub rank: usize,
    pub label: Label,
    pub distance: f32,
}

/// Re-check every returned label against `predicate`.
///
/// Each violation is logged at error level and returned; none of them
/// aborts the check.
pub fn verify_predicate<P>(batch: &QueryBatch, predicate: &P) -> Vec<PredicateViolation>
where
    P: LabelPredicate + ?Sized,
{
    let mut violations = Vec::new();
    for row in 0..batch.rows() {
        for (rank, hit) in batch.row(row).enumerate() {
            if !predicate.accepts(hit.label) {
                error!(row, rank, label = hit.label, "Index returned a filtered-out label");
                violations.push(PredicateViolation {
                    row,
                    rank,
                    label: hit.label,
                    distance: hit.distance,
                });
            }
        }
    }
    violations
}

/// Rows whose own label passes `predicate` but did not come back first.
///
/// Only meaningful when query row `i` is the indexed vector with label `i`.
/// HNSW is approximate, so misses are logged as warnings, not errors.
pub fn verify_self_matches<P>(batch: &QueryBatch, predicate: &P) -> Vec<usize>
where
    P: LabelPredicate + ?Sized,
{
    let misses: Vec<usize> = (0..batch.rows())
        .filter(|&row| predicate.accepts(row as Label))
        .filter(|&row| batch.row(row).next().map(|hit| hit.label) != Some(row as Label))
        .collect();

    for &row in &misses {
        warn!(row, "Query did not return its own vector first");
    }
    misses
}
