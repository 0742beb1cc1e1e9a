// WORKER POOL
// Fixed-width rayon pool that executes every task exactly once and reports
// each result to the shared sink.
//
// SAFETY INVARIANTS:
// 1. `dispatch` returns only after every submitted task has finished (barrier)
// 2. Workers share no mutable state except the sink
// 3. The first failing task aborts the dispatch with that error

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::errors::{EngineError, EngineResult};
use crate::sink::AggregationSink;
use crate::task::Task;

/// Number of execution units the runtime reports, never less than 1.
pub fn available_parallelism() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// What a dispatch actually did, for the completeness check after the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub submitted: usize,
    pub completed: usize,
    pub width: usize,
}

pub struct WorkerPool {
    pool: ThreadPool,
    width: usize,
}

impl WorkerPool {
    /// Builds a pool of `width` threads, or one per available execution unit.
    pub fn new(width: Option<usize>) -> EngineResult<Self> {
        let width = match width {
            Some(0) => return Err(EngineError::InvalidWorkers),
            Some(w) => w,
            None => available_parallelism(),
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|index| format!("parmul-worker-{}", index))
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;
        debug!(width, "worker pool ready");
        Ok(Self { pool, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Runs every task on the pool and blocks until all of them are done.
    pub fn dispatch(
        &self,
        tasks: &[Task],
        sink: &dyn AggregationSink,
    ) -> EngineResult<DispatchReport> {
        let completed = AtomicUsize::new(0);

        self.pool.install(|| {
            tasks.par_iter().try_for_each(|task| -> EngineResult<()> {
                let record = task.execute()?;
                sink.append(record)?;
                completed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        })?;

        Ok(DispatchReport {
            submitted: tasks.len(),
            completed: completed.into_inner(),
            width: self.width,
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("width", &self.width)
            .finish()
    }
}
