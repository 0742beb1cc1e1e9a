// ROUND ENGINE
// Drives one decompose -> reset -> dispatch -> read -> assemble cycle.
//
// SAFETY INVARIANTS:
// 1. Operands are validated before the sink is touched; a shape mismatch
//    leaves the sink exactly as it was
// 2. The sink is reset before the first worker writes
// 3. The sink is read only after the pool barrier returns
// 4. A round with missing cells fails unless the zero-fill policy is selected

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::assembler::assemble;
use crate::config::{EngineConfig, MissingCellPolicy, SinkKind};
use crate::errors::{EngineError, EngineResult};
use crate::matrix::Matrix;
use crate::pool::WorkerPool;
use crate::sink::{AggregationSink, FileSink, MemorySink};
use crate::task::decompose;

/// Per-round bookkeeping returned alongside the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    pub size: usize,
    pub tasks: usize,
    pub completed: usize,
    pub records_read: usize,
    pub distinct_cells: usize,
    pub duplicates: usize,
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub matrix: Matrix,
    pub report: RoundReport,
}

pub struct Engine {
    pool: WorkerPool,
    sink: Arc<dyn AggregationSink>,
    missing_cells: MissingCellPolicy,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pool", &self.pool)
            .field("missing_cells", &self.missing_cells)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        pool: WorkerPool,
        sink: Arc<dyn AggregationSink>,
        missing_cells: MissingCellPolicy,
    ) -> Self {
        Self {
            pool,
            sink,
            missing_cells,
        }
    }

    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let sink: Arc<dyn AggregationSink> = match &config.sink {
            SinkKind::File { path } => Arc::new(FileSink::new(path.clone())),
            SinkKind::Memory => Arc::new(MemorySink::new()),
        };
        let pool = WorkerPool::new(config.workers)?;
        Ok(Self::new(pool, sink, config.missing_cells))
    }

    pub fn workers(&self) -> usize {
        self.pool.width()
    }

    pub fn sink(&self) -> &Arc<dyn AggregationSink> {
        &self.sink
    }

    /// Computes the elementwise product of `a` and `b` across the pool.
    pub fn round(&self, a: &Matrix, b: &Matrix) -> EngineResult<RoundOutcome> {
        let tasks = decompose(a, b)?;
        let size = a.size();

        self.sink.reset()?;
        debug!(size, tasks = tasks.len(), workers = self.pool.width(), "round started");

        let dispatch = self.pool.dispatch(&tasks, self.sink.as_ref())?;
        let records = self.sink.read_all()?;
        let assembly = assemble(size, &records)?;

        if !assembly.is_complete() {
            let expected = assembly.expected_cells();
            match self.missing_cells {
                MissingCellPolicy::Strict => {
                    return Err(EngineError::IncompleteRound {
                        expected,
                        written: assembly.distinct_cells,
                    });
                }
                MissingCellPolicy::ZeroFill => {
                    warn!(
                        expected,
                        written = assembly.distinct_cells,
                        "round incomplete, missing cells left at zero"
                    );
                }
            }
        }

        let report = RoundReport {
            size,
            tasks: dispatch.submitted,
            completed: dispatch.completed,
            records_read: records.len(),
            distinct_cells: assembly.distinct_cells,
            duplicates: assembly.duplicates,
            workers: dispatch.width,
        };
        info!(
            size,
            cells = report.distinct_cells,
            workers = report.workers,
            "round complete"
        );

        Ok(RoundOutcome {
            matrix: assembly.matrix,
            report,
        })
    }
}
