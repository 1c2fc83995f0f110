//! Executor error types.

use thiserror::Error;

/// Errors returned by [`ParallelExecutor::run`](crate::ParallelExecutor::run).
///
/// `E` is the error type produced by the task itself. It is handed back
/// unchanged, wrapped with the item and worker that raised it.
#[derive(Debug, Error)]
pub enum ExecutorError<E> {
    /// The range was rejected before any worker was started
    #[error("Invalid work range: start {start} is past end {end}")]
    InvalidRange { start: usize, end: usize },

    /// First task failure observed by any worker
    #[error("Task failed on item {index} (worker {worker}): {source}")]
    Task {
        index: usize,
        worker: usize,
        #[source]
        source: E,
    },
}

impl<E> ExecutorError<E> {
    /// Item index of the failed task, if a task failed.
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            ExecutorError::Task { index, .. } => Some(*index),
            ExecutorError::InvalidRange { .. } => None,
        }
    }

    /// Unwrap the task error, discarding the item/worker context.
    pub fn into_task_error(self) -> Option<E> {
        match self {
            ExecutorError::Task { source, .. } => Some(source),
            ExecutorError::InvalidRange { .. } => None,
        }
    }
}
