//! Atomic-cursor parallel-for.
//!
//! A single `AtomicUsize` cursor starts at `range.start`. Every worker claims
//! the next item by advancing the cursor by one and exits once the cursor
//! reaches `range.end`. When a task fails the failing worker stores `range.end` into
//! the cursor, so other workers stop claiming; tasks already running are left
//! to finish.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, warn};

use crate::error::ExecutorError;
use crate::workers::WorkerCount;

/// Runs a task once per item of a range on a per-call set of worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelExecutor {
    workers: WorkerCount,
}

impl ParallelExecutor {
    pub fn new(workers: WorkerCount) -> Self {
        Self { workers }
    }

    /// `0` means one worker per hardware thread.
    pub fn with_threads(threads: usize) -> Self {
        Self::new(WorkerCount::from(threads))
    }

    /// Executor that always runs items in order on the calling thread.
    pub fn sequential() -> Self {
        Self::new(WorkerCount::ONE)
    }

    pub fn workers(&self) -> WorkerCount {
        self.workers
    }

    /// Execute `task(item, worker)` for every item in `range`.
    ///
    /// Blocks until every worker has terminated. `worker` is the slot of the
    /// thread running the task, in `0..workers`, and can be used to index
    /// per-worker scratch state.
    ///
    /// With a single worker, items run in ascending order on the calling
    /// thread and no thread is spawned. Otherwise the order is unspecified.
    ///
    /// The first error (or panic) raised by any task stops further items from
    /// being claimed. Errors come back as [`ExecutorError::Task`]; panics are
    /// resumed on the calling thread after the join.
    pub fn run<F, E>(&self, range: Range<usize>, task: F) -> Result<(), ExecutorError<E>>
    where
        F: Fn(usize, usize) -> Result<(), E> + Sync,
        E: Send,
    {
        if range.start > range.end {
            return Err(ExecutorError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }

        // Workers beyond the item count would exit without claiming anything.
        let workers = self.workers.resolve().min(range.len().max(1));
        if workers == 1 {
            return run_sequential(range, &task);
        }
        run_parallel(range, workers, &task)
    }
}

/// Run `task` over `range` with `threads` workers (`0` = auto).
///
/// Shorthand for `ParallelExecutor::with_threads(threads).run(range, task)`.
pub fn parallel_for<F, E>(
    range: Range<usize>,
    threads: usize,
    task: F,
) -> Result<(), ExecutorError<E>>
where
    F: Fn(usize, usize) -> Result<(), E> + Sync,
    E: Send,
{
    ParallelExecutor::with_threads(threads).run(range, task)
}

fn run_sequential<F, E>(range: Range<usize>, task: &F) -> Result<(), ExecutorError<E>>
where
    F: Fn(usize, usize) -> Result<(), E>,
{
    for index in range {
        task(index, 0).map_err(|source| ExecutorError::Task {
            index,
            worker: 0,
            source,
        })?;
    }
    Ok(())
}

fn run_parallel<F, E>(
    range: Range<usize>,
    workers: usize,
    task: &F,
) -> Result<(), ExecutorError<E>>
where
    F: Fn(usize, usize) -> Result<(), E> + Sync,
    E: Send,
{
    let end = range.end;
    let cursor = AtomicUsize::new(range.start);
    let first_failure = FailureSlot::new();

    debug!(start = range.start, end, workers, "Starting executor workers");
    thread::scope(|scope| {
        for worker in 0..workers {
            let cursor = &cursor;
            let first_failure = &first_failure;
            scope.spawn(move || worker_loop(worker, end, cursor, first_failure, task));
        }
    });
    debug!(workers, "Executor workers joined");

    match first_failure.into_inner() {
        None => Ok(()),
        Some(Failure::Task {
            index,
            worker,
            error,
        }) => Err(ExecutorError::Task {
            index,
            worker,
            source: error,
        }),
        Some(Failure::Panic {
            index,
            worker,
            payload,
        }) => {
            warn!(index, worker, "Resuming task panic on caller");
            panic::resume_unwind(payload)
        }
    }
}

fn worker_loop<F, E>(
    worker: usize,
    end: usize,
    cursor: &AtomicUsize,
    first_failure: &FailureSlot<E>,
    task: &F,
) where
    F: Fn(usize, usize) -> Result<(), E>,
{
    while let Some(index) = claim(cursor, end) {
        let failure = match panic::catch_unwind(AssertUnwindSafe(|| task(index, worker))) {
            Ok(Ok(())) => continue,
            Ok(Err(error)) => Failure::Task {
                index,
                worker,
                error,
            },
            Err(payload) => Failure::Panic {
                index,
                worker,
                payload,
            },
        };

        if first_failure.record(failure) {
            warn!(index, worker, "Task failed, cancelling remaining items");
        } else {
            debug!(index, worker, "Task failed after an earlier failure, dropped");
        }
        cursor.store(end, Ordering::Relaxed);
        break;
    }
}

/// Take the next unclaimed item, or `None` once the cursor reaches `end`.
///
/// The cursor never moves past `end`, so a range ending at `usize::MAX`
/// cannot wrap around.
fn claim(cursor: &AtomicUsize, end: usize) -> Option<usize> {
    cursor
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
            if next < end {
                Some(next + 1)
            } else {
                None
            }
        })
        .ok()
}

enum Failure<E> {
    Task {
        index: usize,
        worker: usize,
        error: E,
    },
    Panic {
        index: usize,
        worker: usize,
        payload: Box<dyn Any + Send>,
    },
}

/// First-failure-wins slot shared by all workers of one run.
struct FailureSlot<E> {
    inner: Mutex<Option<Failure<E>>>,
}

impl<E> FailureSlot<E> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Store `failure` unless one is already held. Returns whether it was kept.
    fn record(&self, failure: Failure<E>) -> bool {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(failure);
        true
    }

    fn into_inner(self) -> Option<Failure<E>> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
