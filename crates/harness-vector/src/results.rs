//! Flat per-row result aggregation for query batches.
//!
//! `ResultBuffer` holds `rows * k` score/label slots laid out row-major.
//! Each query task writes only its own row, so workers never touch the
//! same slot and no lock is needed. Slots are atomics so the buffer can be
//! shared by reference across workers; values are read back only through
//! [`ResultBuffer::into_batch`], which takes the buffer by value and so
//! cannot run while a worker still borrows it.
//!
//! Rows with fewer than `k` hits are padded with [`EMPTY_LABEL`] and an
//! infinite distance. The number of real hits per row is kept alongside.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::error::VectorError;
use crate::index::{Label, Neighbor};

/// Label stored in padding slots of short rows.
pub const EMPTY_LABEL: Label = Label::MAX;

/// Shared write side of a query batch.
#[derive(Debug)]
pub struct ResultBuffer {
    rows: usize,
    k: usize,
    scores: Vec<AtomicU32>,
    labels: Vec<AtomicU64>,
    filled: Vec<AtomicUsize>,
}

impl ResultBuffer {
    pub fn new(rows: usize, k: usize) -> Self {
        let slots = rows * k;
        Self {
            rows,
            k,
            scores: (0..slots)
                .map(|_| AtomicU32::new(f32::INFINITY.to_bits()))
                .collect(),
            labels: (0..slots).map(|_| AtomicU64::new(EMPTY_LABEL)).collect(),
            filled: (0..rows).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Copy `hits` into `row`, padding the tail of the row.
    ///
    /// Hits past `k` are ignored. Each row must be written by one task only.
    pub fn write_row(&self, row: usize, hits: &[Neighbor]) -> Result<(), VectorError> {
        if row >= self.rows {
            return Err(VectorError::RowOutOfBounds {
                row,
                rows: self.rows,
            });
        }

        let base = row * self.k;
        for slot in 0..self.k {
            let (label, distance) = match hits.get(slot) {
                Some(hit) => (hit.label, hit.distance),
                None => (EMPTY_LABEL, f32::INFINITY),
            };
            self.labels[base + slot].store(label, Ordering::Relaxed);
            self.scores[base + slot].store(distance.to_bits(), Ordering::Relaxed);
        }
        self.filled[row].store(hits.len().min(self.k), Ordering::Relaxed);
        Ok(())
    }

    /// Finish writing and expose the flat arrays.
    pub fn into_batch(self) -> QueryBatch {
        QueryBatch {
            rows: self.rows,
            k: self.k,
            scores: self
                .scores
                .into_iter()
                .map(|bits| f32::from_bits(bits.into_inner()))
                .collect(),
            labels: self.labels.into_iter().map(AtomicU64::into_inner).collect(),
            filled: self.filled.into_iter().map(AtomicUsize::into_inner).collect(),
        }
    }
}

/// Read side of a finished query batch.
///
/// `scores()[row * k + i]` and `labels()[row * k + i]` hold the `i`-th
/// closest hit of `row`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBatch {
    rows: usize,
    k: usize,
    scores: Vec<f32>,
    labels: Vec<Label>,
    filled: Vec<usize>,
}

impl QueryBatch {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Number of real hits in `row` (0 for rows outside the batch).
    pub fn row_len(&self, row: usize) -> usize {
        self.filled.get(row).copied().unwrap_or(0)
    }

    /// Real hits of `row`, closest first. Padding is skipped.
    pub fn row(&self, row: usize) -> impl Iterator<Item = Neighbor> + '_ {
        let base = row * self.k;
        let len = self.row_len(row);
        self.labels
            .iter()
            .zip(&self.scores)
            .skip(base)
            .take(len)
            .map(|(&label, &distance)| Neighbor { distance, label })
    }

    /// Rows that came back with fewer than `k` hits.
    pub fn short_rows(&self) -> Vec<usize> {
        (0..self.rows)
            .filter(|&row| self.row_len(row) < self.k)
            .collect()
    }
}
