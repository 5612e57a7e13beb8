//! Iteration Striding
//!
//! How `spread_the_sweat` splits `[0, iterations)` between workers.
//! Every shop uses the same arithmetic.

use std::ops::Range;

/// Iteration count type
pub type Iterations = u32;

/// Half-open range of iterations handed to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRange {
    pub start: Iterations,
    pub stop: Iterations,
}

impl WorkerRange {
    /// Number of iterations in the range
    pub fn len(&self) -> Iterations {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// As a std range
    pub fn as_range(&self) -> Range<Iterations> {
        self.start..self.stop
    }
}

/// Number of chunks issued for `iterations` over `workers`.
///
/// Never more chunks than iterations, so no chunk is empty.
pub fn chunk_count(iterations: Iterations, workers: usize) -> usize {
    let workers = workers.max(1);
    workers.min(iterations as usize)
}

/// Range of the `worker_index`-th chunk.
///
/// The first `iterations % workers` chunks take one extra iteration.
/// `workers` must be the chunk count, i.e. `chunk_count(iterations, ..)`.
pub fn worker_range(worker_index: usize, iterations: Iterations, workers: usize) -> WorkerRange {
    debug_assert!(workers > 0);
    debug_assert!(worker_index < workers);

    let workers = workers as u64;
    let index = worker_index as u64;
    let total = u64::from(iterations);

    let per_worker = total / workers;
    let extra = total % workers;

    let extra_iters = index.min(extra);
    let plain_iters = index - extra_iters;
    let has_extra = u64::from(index < extra);

    let start = extra_iters * (per_worker + 1) + plain_iters * per_worker;
    let stop = start + per_worker + has_extra;
    debug_assert!(stop <= total);

    // Both bounds are <= iterations, which fits in Iterations.
    WorkerRange {
        start: start as Iterations,
        stop: stop as Iterations,
    }
}

/// All chunk ranges for `iterations` over at most `workers` workers
pub fn worker_ranges(iterations: Iterations, workers: usize) -> Vec<WorkerRange> {
    let chunks = chunk_count(iterations, workers);
    (0..chunks)
        .map(|index| worker_range(index, iterations, chunks))
        .collect()
}
