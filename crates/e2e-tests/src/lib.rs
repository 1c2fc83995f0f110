//! End-to-end test infrastructure for the ANN harness.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering build, save/load and filtered query batches against the real
//! usearch index.

use std::path::PathBuf;

use harness_executor::ParallelExecutor;
use harness_vector::{
    populate, FilteredIndex, HnswConfig, HnswIndex, Label, PersistentIndex, QueryBatch, VectorSet,
};

/// Shared test harness for E2E tests.
///
/// Owns a temp directory and the index path inside it.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Path for the saved index file
    pub index_path: PathBuf,
}

impl TestHarness {
    /// Create a new test harness with a temp directory.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_path = temp_dir.path().join("index").join("hnsw.usearch");
        Self {
            _temp_dir: temp_dir,
            index_path,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// `n` 2-D points on a line: label `i` sits at `(i, 0)`.
pub fn line_vectors(n: usize) -> VectorSet {
    let rows: Vec<[f32; 2]> = (0..n).map(|i| [i as f32, 0.0]).collect();
    VectorSet::from_rows(2, &rows).expect("Failed to build line vectors")
}

/// HNSW config generous enough that small test indexes search exhaustively.
pub fn small_config(dimension: usize, capacity: usize) -> HnswConfig {
    HnswConfig::new(dimension, capacity)
        .with_connectivity(16)
        .with_expansion(128, 128)
}

/// Create an index and insert every vector with `threads` workers.
pub fn build_index(config: &HnswConfig, vectors: &VectorSet, threads: usize) -> HnswIndex {
    let index = HnswIndex::create(config).expect("Failed to create index");
    populate(&index, vectors, &ParallelExecutor::with_threads(threads))
        .expect("Failed to populate index");
    assert_eq!(index.len(), vectors.len());
    index
}

/// Real (non-padding) labels of one result row.
pub fn row_labels(batch: &QueryBatch, row: usize) -> Vec<Label> {
    batch.row(row).map(|hit| hit.label).collect()
}
