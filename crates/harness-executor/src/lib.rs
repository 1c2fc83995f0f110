//! # harness-executor
//!
//! Parallel-for over a half-open range of work items.
//!
//! Work is handed out one item at a time from a shared atomic cursor, so
//! uneven per-item cost balances itself across workers. The first failure
//! raised by any task cancels the remaining work and is returned to the
//! caller once every worker has been joined.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use harness_executor::parallel_for;
//!
//! let sum = AtomicUsize::new(0);
//! parallel_for(0..100, 4, |item, _worker| {
//!     sum.fetch_add(item, Ordering::Relaxed);
//!     Ok::<(), std::io::Error>(())
//! })
//! .unwrap();
//! assert_eq!(sum.into_inner(), 4950);
//! ```

pub mod error;
pub mod executor;
pub mod workers;

pub use error::ExecutorError;
pub use executor::{parallel_for, ParallelExecutor};
pub use workers::WorkerCount;
