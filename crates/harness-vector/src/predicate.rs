//! Label predicates for filtered search.
//!
//! Any `Fn(Label) -> bool + Send + Sync` closure is a predicate, so callers
//! rarely need a named type. Predicates are evaluated by the index on
//! worker threads and must be pure.

use std::num::NonZeroU64;

use crate::error::VectorError;
use crate::index::Label;

/// Boolean test over a label, chosen by the caller of a filtered search.
pub trait LabelPredicate: Send + Sync {
    fn accepts(&self, label: Label) -> bool;
}

impl<F> LabelPredicate for F
where
    F: Fn(Label) -> bool + Send + Sync,
{
    fn accepts(&self, label: Label) -> bool {
        self(label)
    }
}

/// Accepts labels that are multiples of a non-zero divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisibleBy {
    divisor: NonZeroU64,
}

impl DivisibleBy {
    /// A zero divisor is rejected.
    pub fn new(divisor: u64) -> Result<Self, VectorError> {
        NonZeroU64::new(divisor)
            .map(|divisor| Self { divisor })
            .ok_or_else(|| VectorError::Config("divisor must be > 0".to_string()))
    }

    pub fn divisor(&self) -> u64 {
        self.divisor.get()
    }
}

impl LabelPredicate for DivisibleBy {
    fn accepts(&self, label: Label) -> bool {
        label % self.divisor == 0
    }
}

/// Accepts every label.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl LabelPredicate for AcceptAll {
    fn accepts(&self, _label: Label) -> bool {
        true
    }
}
