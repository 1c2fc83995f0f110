//! Vector index error types.

use harness_executor::ExecutorError;
use thiserror::Error;

/// Errors that can occur during index and workflow operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Label already present in the index
    #[error("Duplicate label: {0}")]
    DuplicateLabel(u64),

    /// Index is full
    #[error("Index capacity reached: {0}")]
    CapacityReached(usize),

    /// Rejected configuration, raised before any work starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Executor range rejected before any worker started
    #[error("Invalid work range: start {start} is past end {end}")]
    InvalidRange { start: usize, end: usize },

    /// Result row outside the buffer
    #[error("Result row {row} out of bounds ({rows} rows)")]
    RowOutOfBounds { row: usize, rows: usize },

    /// First failure raised by a parallel insert or query task
    #[error("Task failed on item {index} (worker {worker}): {source}")]
    Task {
        index: usize,
        worker: usize,
        #[source]
        source: Box<VectorError>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VectorError {
    /// Innermost error, looking through task wrappers.
    pub fn root(&self) -> &VectorError {
        match self {
            VectorError::Task { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ExecutorError<VectorError>> for VectorError {
    fn from(err: ExecutorError<VectorError>) -> Self {
        match err {
            ExecutorError::InvalidRange { start, end } => VectorError::InvalidRange { start, end },
            ExecutorError::Task {
                index,
                worker,
                source,
            } => VectorError::Task {
                index,
                worker,
                source: Box::new(source),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VectorError::DuplicateLabel(42);
        assert_eq!(err.to_string(), "Duplicate label: 42");

        let err = VectorError::DimensionMismatch {
            expected: 128,
            actual: 2,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 128, got 2");
    }

    #[test]
    fn test_from_executor_error() {
        let err: VectorError = ExecutorError::Task {
            index: 3,
            worker: 1,
            source: VectorError::DuplicateLabel(3),
        }
        .into();
        assert!(matches!(err, VectorError::Task { index: 3, worker: 1, .. }));
        assert!(matches!(err.root(), VectorError::DuplicateLabel(3)));

        let err: VectorError =
            ExecutorError::<VectorError>::InvalidRange { start: 2, end: 1 }.into();
        assert!(matches!(err, VectorError::InvalidRange { start: 2, end: 1 }));
    }
}
