//! Row-major vector sets used as index input and query batches.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::VectorError;

/// Fixed-dimension vectors stored contiguously, row `i` is
/// `data[i * dimension..(i + 1) * dimension]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSet {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorSet {
    /// Wrap flat row-major data. The length must be a multiple of `dimension`.
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self, VectorError> {
        if dimension == 0 {
            return Err(VectorError::Config("dimension must be > 0".to_string()));
        }
        if data.len() % dimension != 0 {
            return Err(VectorError::Config(format!(
                "{} values do not split into rows of {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Build from individual rows, all of length `dimension`.
    pub fn from_rows<R: AsRef<[f32]>>(dimension: usize, rows: &[R]) -> Result<Self, VectorError> {
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: dimension,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::from_flat(dimension, data)
    }

    /// `count` vectors with components drawn uniformly from `[0, 1)`.
    ///
    /// The same seed always yields the same vectors, so a saved index can be
    /// queried with the data it was built from.
    pub fn uniform(dimension: usize, count: usize, seed: u64) -> Result<Self, VectorError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..dimension * count).map(|_| rng.random::<f32>()).collect();
        Self::from_flat(dimension, data)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row `i`. Panics if `i >= len()`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dimension..(i + 1) * self.dimension]
    }

    /// The first `n` rows (all rows if `n > len()`).
    pub fn head(&self, n: usize) -> Self {
        let end = n.min(self.len()) * self.dimension;
        Self {
            dimension: self.dimension,
            data: self.data[..end].to_vec(),
        }
    }

    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}
