//! Index collaborator contract.
//!
//! Defines the interface the workflow needs from an ANN index: concurrent
//! inserts of distinct labels, concurrent filtered searches, and
//! save/load of the whole index.

use std::path::Path;

use crate::error::VectorError;
use crate::hnsw::HnswConfig;
use crate::predicate::LabelPredicate;

/// Identifier attached to every indexed vector.
pub type Label = u64;

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Distance to the query (lower = closer)
    pub distance: f32,
    /// Label of the indexed vector
    pub label: Label,
}

impl Neighbor {
    pub fn new(label: Label, distance: f32) -> Self {
        Self { distance, label }
    }
}

/// Search hits ordered closer-first, at most `k` long.
pub type QueryResult = Vec<Neighbor>;

/// Index statistics
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Number of vectors in the index
    pub vector_count: usize,
    /// Number of vectors the index can hold without growing
    pub capacity: usize,
    /// Vector dimension
    pub dimension: usize,
    /// Current query-time search depth
    pub search_effort: usize,
}

/// Filtered k-NN index.
///
/// Implementations must allow concurrent `insert` calls with distinct
/// labels and concurrent `search_filtered` calls from many threads.
pub trait FilteredIndex: Send + Sync {
    /// Get the vector dimension
    fn dimension(&self) -> usize;

    /// Get the number of vectors in the index
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a vector under `label`.
    /// Fails if the label already exists, the dimension is wrong, or the
    /// index is full.
    fn insert(&self, label: Label, vector: &[f32]) -> Result<(), VectorError>;

    /// Up to `k` nearest neighbors whose labels pass `predicate`, closest
    /// first. The predicate is applied while searching, so rejected labels
    /// never take up one of the `k` slots.
    fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        predicate: &dyn LabelPredicate,
    ) -> Result<QueryResult, VectorError>;

    /// Set the query-time accuracy/speed tradeoff (HNSW `ef`).
    fn set_search_effort(&self, effort: usize);

    /// Get index statistics
    fn stats(&self) -> IndexStats;

    /// Save index to `path`
    fn save(&self, path: &Path) -> Result<(), VectorError>;
}

/// Index that can be constructed empty or restored from a saved file.
///
/// Both constructors yield the same type, so code after build-or-load does
/// not care which path produced the index.
pub trait PersistentIndex: FilteredIndex + Sized {
    /// Create an empty index sized for `config.capacity` vectors.
    fn create(config: &HnswConfig) -> Result<Self, VectorError>;

    /// Restore an index previously written by [`FilteredIndex::save`].
    fn load(config: &HnswConfig, path: &Path) -> Result<Self, VectorError>;
}
