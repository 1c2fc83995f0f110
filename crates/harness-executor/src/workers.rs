//! Worker count resolution.

use std::fmt;
use std::num::NonZeroUsize;
use std::thread;

/// Number of worker threads for one executor run.
///
/// `0` converts to [`WorkerCount::Auto`], which resolves to the number of
/// hardware threads available when the run starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerCount {
    /// One worker per available hardware thread
    #[default]
    Auto,
    /// Exactly this many workers
    Fixed(NonZeroUsize),
}

impl WorkerCount {
    /// Single worker: items run in order on the calling thread.
    pub const ONE: Self = Self::Fixed(NonZeroUsize::MIN);

    /// Resolve to a concrete worker count (always >= 1).
    pub fn resolve(self) -> usize {
        match self {
            Self::Auto => thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            Self::Fixed(n) => n.get(),
        }
    }
}

impl From<usize> for WorkerCount {
    fn from(n: usize) -> Self {
        NonZeroUsize::new(n).map_or(Self::Auto, Self::Fixed)
    }
}

impl From<NonZeroUsize> for WorkerCount {
    fn from(n: NonZeroUsize) -> Self {
        Self::Fixed(n)
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fixed(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_auto() {
        assert_eq!(WorkerCount::from(0), WorkerCount::Auto);
        assert_eq!(WorkerCount::default(), WorkerCount::Auto);
    }

    #[test]
    fn test_fixed_resolves_to_itself() {
        assert_eq!(WorkerCount::from(6).resolve(), 6);
        assert_eq!(WorkerCount::ONE.resolve(), 1);
    }

    #[test]
    fn test_auto_resolves_to_at_least_one() {
        assert!(WorkerCount::Auto.resolve() >= 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(WorkerCount::Auto.to_string(), "auto");
        assert_eq!(WorkerCount::from(20).to_string(), "20");
    }
}
