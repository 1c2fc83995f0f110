//! # harness-vector
//!
//! Filtered k-NN workflow around an external HNSW index.
//!
//! The HNSW graph itself lives in usearch; this crate defines the calling
//! contract with it and fans inserts and queries out over
//! [`harness_executor::ParallelExecutor`].
//!
//! ## Features
//! - `FilteredIndex` / `PersistentIndex`: insert, filtered closer-first
//!   search, save and load
//! - `HnswIndex`: usearch-backed implementation
//! - Label predicates (`DivisibleBy`, `AcceptAll`, any `Fn(Label) -> bool`)
//! - Lock-free per-row result aggregation (`ResultBuffer`)
//! - Build-or-load lifecycle and batched filtered queries

pub mod error;
pub mod hnsw;
pub mod index;
pub mod predicate;
pub mod results;
pub mod vectors;
pub mod workflow;

pub use error::VectorError;
pub use hnsw::{DistanceMetric, HnswConfig, HnswIndex};
pub use index::{FilteredIndex, IndexStats, Label, Neighbor, PersistentIndex, QueryResult};
pub use predicate::{AcceptAll, DivisibleBy, LabelPredicate};
pub use results::{QueryBatch, ResultBuffer, EMPTY_LABEL};
pub use vectors::VectorSet;
pub use workflow::{
    build_or_load, populate, run_filtered_queries, verify_predicate, verify_self_matches,
    IndexOrigin, PredicateViolation, QueryRun,
};
