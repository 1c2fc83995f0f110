//! Build-or-load E2E tests.
//!
//! The first call builds, saves and reloads; later calls load. Both must
//! answer queries identically.

use pretty_assertions::assert_eq;

use e2e_tests::{build_index, line_vectors, small_config, TestHarness};
use harness_executor::{ParallelExecutor, WorkerCount};
use harness_vector::{
    build_or_load, run_filtered_queries, DivisibleBy, FilteredIndex, HnswIndex, IndexOrigin,
    PersistentIndex, VectorSet,
};

#[test]
fn test_build_then_load_from_same_path() {
    let harness = TestHarness::new();
    let vectors = VectorSet::uniform(16, 400, 47).unwrap();
    let config = small_config(16, 400);
    let executor = ParallelExecutor::with_threads(4);

    let (first, origin) =
        build_or_load::<HnswIndex>(&config, &harness.index_path, &vectors, &executor).unwrap();
    assert!(matches!(origin, IndexOrigin::Built { inserted: 400, .. }));
    assert!(harness.index_path.exists());
    assert_eq!(first.len(), 400);

    let (second, origin) =
        build_or_load::<HnswIndex>(&config, &harness.index_path, &vectors, &executor).unwrap();
    assert_eq!(origin, IndexOrigin::Loaded);
    assert_eq!(second.len(), 400);

    let even = DivisibleBy::new(2).unwrap();
    let queries = vectors.head(25);
    let a = run_filtered_queries(&first, &queries, 10, &even, &executor).unwrap();
    let b = run_filtered_queries(&second, &queries, 10, &even, &executor).unwrap();
    assert_eq!(a.batch, b.batch);
}

/// An index queried before saving and after reloading answers the same.
#[test]
fn test_in_memory_and_reloaded_agree() {
    let harness = TestHarness::new();
    let vectors = line_vectors(50);
    let config = small_config(2, 50);

    let built = build_index(&config, &vectors, 4);
    built.save(&harness.index_path).unwrap();
    let loaded = HnswIndex::load(&config, &harness.index_path).unwrap();

    let even = DivisibleBy::new(2).unwrap();
    let executor = ParallelExecutor::with_threads(2);
    let before = run_filtered_queries(&built, &vectors, 6, &even, &executor).unwrap();
    let after = run_filtered_queries(&loaded, &vectors, 6, &even, &executor).unwrap();
    assert_eq!(before.batch, after.batch);
}

/// A saved index for another dimension is rejected on load.
#[test]
fn test_load_with_wrong_dimension() {
    let harness = TestHarness::new();
    let vectors = line_vectors(10);
    build_index(&small_config(2, 10), &vectors, 1)
        .save(&harness.index_path)
        .unwrap();

    let result = HnswIndex::load(&small_config(3, 10), &harness.index_path);
    assert!(result.is_err());
}

/// Build and reload sized for more workers than the machine has cores.
#[test]
fn test_build_or_load_with_many_workers() {
    let harness = TestHarness::new();
    let workers = WorkerCount::Auto.resolve() * 4;
    let executor = ParallelExecutor::with_threads(workers);
    let vectors = VectorSet::uniform(8, 1000, 3).unwrap();
    let config = small_config(8, 1000);

    let (built, origin) =
        build_or_load::<HnswIndex>(&config, &harness.index_path, &vectors, &executor).unwrap();
    assert!(matches!(origin, IndexOrigin::Built { inserted: 1000, .. }));
    assert!(built.threads() >= workers);

    let (loaded, origin) =
        build_or_load::<HnswIndex>(&config, &harness.index_path, &vectors, &executor).unwrap();
    assert_eq!(origin, IndexOrigin::Loaded);
    assert!(loaded.threads() >= workers);

    let thirds = DivisibleBy::new(3).unwrap();
    let run = run_filtered_queries(&loaded, &vectors.head(100), 5, &thirds, &executor).unwrap();
    assert_eq!(run.per_worker.iter().sum::<usize>(), 100);
}
