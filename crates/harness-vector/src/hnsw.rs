//! HNSW index implementation using usearch.
//!
//! usearch handles concurrent `add` calls for distinct keys and concurrent
//! searches through interior synchronisation, but each call needs one of the
//! thread contexts reserved up front. The wrapper reserves `threads` contexts
//! and admits at most that many native calls at once, so callers may use any
//! number of worker threads.

use std::fs;
use std::path::Path;
use std::sync::{Condvar, Mutex, PoisonError};

use harness_executor::WorkerCount;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorError;
use crate::index::{FilteredIndex, IndexStats, Label, Neighbor, PersistentIndex, QueryResult};
use crate::predicate::LabelPredicate;

/// Distance function used by the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared euclidean distance
    #[default]
    L2Squared,
    /// Cosine distance
    Cosine,
    /// Inner product distance
    InnerProduct,
}

impl DistanceMetric {
    fn to_usearch(self) -> MetricKind {
        match self {
            DistanceMetric::L2Squared => MetricKind::L2sq,
            DistanceMetric::Cosine => MetricKind::Cos,
            DistanceMetric::InnerProduct => MetricKind::IP,
        }
    }
}

/// HNSW index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Vector dimension
    pub dimension: usize,
    /// Number of connections per layer (M parameter)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Maximum capacity (for pre-allocation)
    pub capacity: usize,
    /// Distance metric
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Thread contexts to reserve (0 = one per hardware thread)
    #[serde(default)]
    pub threads: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: 128,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 64,
            capacity: 10_000,
            metric: DistanceMetric::default(),
            threads: 0,
        }
    }
}

impl HnswConfig {
    pub fn new(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            capacity,
            ..Default::default()
        }
    }

    pub fn with_connectivity(mut self, m: usize) -> Self {
        self.connectivity = m;
        self
    }

    pub fn with_expansion(mut self, ef_add: usize, ef_search: usize) -> Self {
        self.expansion_add = ef_add;
        self.expansion_search = ef_search;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Reserve at least one thread context per worker of `workers`.
    pub fn for_workers(self, workers: WorkerCount) -> Self {
        let threads = self.resolved_threads().max(workers.resolve());
        self.with_threads(threads)
    }

    /// Number of thread contexts the index reserves (always >= 1).
    pub fn resolved_threads(&self) -> usize {
        WorkerCount::from(self.threads).resolve()
    }

    /// Reject configurations the index cannot be built with.
    pub fn validate(&self) -> Result<(), VectorError> {
        if self.dimension == 0 {
            return Err(VectorError::Config("dimension must be > 0".to_string()));
        }
        if self.capacity == 0 {
            return Err(VectorError::Config("capacity must be > 0".to_string()));
        }
        if self.connectivity == 0 {
            return Err(VectorError::Config("connectivity must be > 0".to_string()));
        }
        Ok(())
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: self.metric.to_usearch(),
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false, // Single vector per label
        }
    }
}

/// Counting gate over the native thread contexts.
struct ThreadContexts {
    free: Mutex<usize>,
    returned: Condvar,
}

impl ThreadContexts {
    fn new(count: usize) -> Self {
        Self {
            free: Mutex::new(count),
            returned: Condvar::new(),
        }
    }

    /// Block until a context is free.
    fn acquire(&self) -> ContextPermit<'_> {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        while *free == 0 {
            free = self
                .returned
                .wait(free)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *free -= 1;
        ContextPermit { contexts: self }
    }
}

struct ContextPermit<'a> {
    contexts: &'a ThreadContexts,
}

impl Drop for ContextPermit<'_> {
    fn drop(&mut self) {
        let mut free = self
            .contexts
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *free += 1;
        self.contexts.returned.notify_one();
    }
}

/// HNSW index wrapper around usearch.
pub struct HnswIndex {
    index: Index,
    config: HnswConfig,
    contexts: ThreadContexts,
    threads: usize,
}

impl HnswIndex {
    fn native(config: &HnswConfig) -> Result<Index, VectorError> {
        Index::new(&config.options()).map_err(|e| VectorError::Index(e.to_string()))
    }

    fn wrap(index: Index, config: &HnswConfig, threads: usize) -> Self {
        Self {
            index,
            config: config.clone(),
            contexts: ThreadContexts::new(threads),
            threads,
        }
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Native calls that may run at once.
    pub fn threads(&self) -> usize {
        self.threads
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn path_str(path: &Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))
}

impl PersistentIndex for HnswIndex {
    fn create(config: &HnswConfig) -> Result<Self, VectorError> {
        config.validate()?;
        let threads = config.resolved_threads();
        info!(
            dim = config.dimension,
            capacity = config.capacity,
            m = config.connectivity,
            ef_construction = config.expansion_add,
            threads,
            "Creating new vector index"
        );

        let index = Self::native(config)?;
        index
            .reserve_capacity_and_threads(config.capacity, threads)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        Ok(Self::wrap(index, config, threads))
    }

    fn load(config: &HnswConfig, path: &Path) -> Result<Self, VectorError> {
        config.validate()?;
        if !path.exists() {
            return Err(VectorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("index file not found: {}", path.display()),
            )));
        }

        info!(path = ?path, "Opening existing vector index");
        let index = Self::native(config)?;
        index
            .load(path_str(path)?)
            .map_err(|e| VectorError::Index(format!("Failed to load: {}", e)))?;

        if index.dimensions() != config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: config.dimension,
                actual: index.dimensions(),
            });
        }
        // Loading resets the reserved thread contexts.
        let threads = config.resolved_threads();
        index
            .reserve_capacity_and_threads(index.size().max(config.capacity), threads)
            .map_err(|e| VectorError::Index(e.to_string()))?;
        // Search depth is a runtime knob, not part of the saved graph.
        index.change_expansion_search(config.expansion_search);

        info!(path = ?path, vectors = index.size(), threads, "Loaded vector index");
        Ok(Self::wrap(index, config, threads))
    }
}

impl FilteredIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn len(&self) -> usize {
        self.index.size()
    }

    fn insert(&self, label: Label, vector: &[f32]) -> Result<(), VectorError> {
        self.check_dimension(vector)?;

        if self.index.contains(label) {
            return Err(VectorError::DuplicateLabel(label));
        }
        let capacity = self.index.capacity();
        if self.index.size() >= capacity {
            return Err(VectorError::CapacityReached(capacity));
        }

        let _permit = self.contexts.acquire();
        self.index
            .add(label, vector)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        trace!(label, "Added vector");
        Ok(())
    }

    fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        predicate: &dyn LabelPredicate,
    ) -> Result<QueryResult, VectorError> {
        self.check_dimension(query)?;

        let size = self.index.size();
        if k == 0 || size == 0 {
            return Ok(Vec::new());
        }

        let matches = {
            let _permit = self.contexts.acquire();
            self.index
                .filtered_search(query, k.min(size), |label: Label| predicate.accepts(label))
                .map_err(|e| VectorError::Index(e.to_string()))?
        };

        let results: QueryResult = matches
            .keys
            .into_iter()
            .zip(matches.distances)
            .map(|(label, distance)| Neighbor::new(label, distance))
            .collect();

        debug!(k, found = results.len(), "Filtered search complete");
        Ok(results)
    }

    fn set_search_effort(&self, effort: usize) {
        self.index.change_expansion_search(effort);
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            vector_count: self.index.size(),
            capacity: self.index.capacity(),
            dimension: self.config.dimension,
            search_effort: self.index.expansion_search(),
        }
    }

    fn save(&self, path: &Path) -> Result<(), VectorError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.index
            .save(path_str(path)?)
            .map_err(|e| VectorError::Index(format!("Failed to save: {}", e)))?;

        info!(path = ?path, vectors = self.index.size(), "Saved vector index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{AcceptAll, DivisibleBy};
    use tempfile::TempDir;

    fn random_vector(dim: usize) -> Vec<f32> {
        use rand::Rng;
        let mut rng = rand::rng();
        (0..dim).map(|_| rng.random()).collect()
    }

    fn line_index(n: u64) -> HnswIndex {
        let config = HnswConfig::new(2, 64).with_expansion(64, 64);
        let index = HnswIndex::create(&config).unwrap();
        for label in 0..n {
            index.insert(label, &[label as f32, 0.0]).unwrap();
        }
        index
    }

    #[test]
    fn test_create_index() {
        let index = HnswIndex::create(&HnswConfig::new(64, 100)).unwrap();
        assert_eq!(index.dimension(), 64);
        assert_eq!(index.len(), 0);
        assert!(index.stats().capacity >= 100);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = HnswIndex::create(&HnswConfig::new(64, 0));
        assert!(matches!(result, Err(VectorError::Config(_))));

        let result = HnswIndex::create(&HnswConfig::new(0, 10));
        assert!(matches!(result, Err(VectorError::Config(_))));
    }

    #[test]
    fn test_insert_and_search() {
        let index = HnswIndex::create(&HnswConfig::new(64, 100)).unwrap();
        for i in 0..10 {
            index.insert(i, &random_vector(64)).unwrap();
        }
        assert_eq!(index.len(), 10);

        let results = index
            .search_filtered(&random_vector(64), 5, &AcceptAll)
            .unwrap();
        assert_eq!(results.len(), 5);

        // Closer first
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_filtered_search_only_returns_accepted_labels() {
        let index = line_index(10);
        let even = DivisibleBy::new(2).unwrap();

        let results = index.search_filtered(&[4.2, 0.0], 3, &even).unwrap();
        let labels: Vec<Label> = results.iter().map(|n| n.label).collect();
        assert_eq!(labels, vec![4, 6, 2]);
    }

    #[test]
    fn test_strict_filter_returns_short_result() {
        let index = line_index(10);
        let thirds = DivisibleBy::new(3).unwrap();

        let results = index.search_filtered(&[0.0, 0.0], 5, &thirds).unwrap();
        let labels: Vec<Label> = results.iter().map(|n| n.label).collect();
        assert_eq!(labels, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_search_empty_index() {
        let index = HnswIndex::create(&HnswConfig::new(2, 10)).unwrap();
        let results = index.search_filtered(&[0.0, 0.0], 5, &AcceptAll).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let index = line_index(3);
        let result = index.insert(1, &[9.0, 9.0]);
        assert!(matches!(result, Err(VectorError::DuplicateLabel(1))));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = HnswIndex::create(&HnswConfig::new(64, 10)).unwrap();

        let result = index.insert(0, &random_vector(32));
        assert!(matches!(result, Err(VectorError::DimensionMismatch { .. })));

        let result = index.search_filtered(&random_vector(32), 1, &AcceptAll);
        assert!(matches!(result, Err(VectorError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("hnsw.usearch");
        let config = HnswConfig::new(2, 64).with_expansion(64, 64);

        let built = line_index(10);
        built.save(&path).unwrap();

        let loaded = HnswIndex::load(&config, &path).unwrap();
        assert_eq!(loaded.len(), 10);
        assert_eq!(loaded.stats().search_effort, 64);

        let even = DivisibleBy::new(2).unwrap();
        let before = built.search_filtered(&[3.0, 0.0], 4, &even).unwrap();
        let after = loaded.search_filtered(&[3.0, 0.0], 4, &even).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.usearch");
        let result = HnswIndex::load(&HnswConfig::new(2, 10), &path);
        assert!(matches!(result, Err(VectorError::Io(_))));
    }

    #[test]
    fn test_set_search_effort() {
        let index = line_index(4);
        index.set_search_effort(300);
        assert_eq!(index.stats().search_effort, 300);
    }

    #[test]
    fn test_thread_contexts_bound_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;
        use std::time::Duration;

        let contexts = ThreadContexts::new(2);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        let _permit = contexts.acquire();
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(200));
                        active.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_threads_follow_config() {
        let index = HnswIndex::create(&HnswConfig::new(2, 10).with_threads(3)).unwrap();
        assert_eq!(index.threads(), 3);

        let auto = HnswIndex::create(&HnswConfig::new(2, 10)).unwrap();
        assert!(auto.threads() >= 1);
    }

    #[test]
    fn test_for_workers_never_shrinks() {
        let config = HnswConfig::new(2, 10).with_threads(4);
        assert_eq!(config.clone().for_workers(WorkerCount::from(2)).threads, 4);
        assert_eq!(config.for_workers(WorkerCount::from(12)).threads, 12);
    }

    #[test]
    fn test_many_more_workers_than_contexts() {
        use crate::vectors::VectorSet;
        use crate::workflow::{populate, run_filtered_queries};
        use harness_executor::ParallelExecutor;

        let hardware = WorkerCount::Auto.resolve();
        let executor = ParallelExecutor::with_threads(hardware * 8);
        let vectors = VectorSet::uniform(16, 2000, 47).unwrap();

        // Two contexts, many workers: callers queue instead of starving usearch.
        let index = HnswIndex::create(&HnswConfig::new(16, 2000).with_threads(2)).unwrap();
        assert_eq!(populate(&index, &vectors, &executor).unwrap(), 2000);
        assert_eq!(index.len(), 2000);

        let even = DivisibleBy::new(2).unwrap();
        let run = run_filtered_queries(&index, &vectors.head(64), 5, &even, &executor).unwrap();
        assert_eq!(run.batch.rows(), 64);
        assert_eq!(run.per_worker.iter().sum::<usize>(), 64);
    }

    #[test]
    fn test_load_reserves_threads_again() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hnsw.usearch");
        line_index(10).save(&path).unwrap();

        let config = HnswConfig::new(2, 64).with_threads(5);
        let loaded = HnswIndex::load(&config, &path).unwrap();
        assert_eq!(loaded.threads(), 5);
        assert!(loaded.stats().capacity >= 64);
        loaded.insert(10, &[10.0, 0.0]).unwrap();
        assert_eq!(loaded.len(), 11);
    }
}
