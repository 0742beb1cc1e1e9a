// RESULT ASSEMBLER
// Rebuilds the dense product from the records read back out of the sink.
//
// Records are applied in read order, so a repeated coordinate keeps its last
// value. Coordinates that never arrived stay zero; the counts in `Assembly`
// let the caller decide whether that is acceptable.

use std::collections::HashSet;

use tracing::warn;

use crate::errors::EngineResult;
use crate::matrix::Matrix;
use crate::task::ResultRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub matrix: Matrix,
    /// Distinct in-bounds coordinates written.
    pub distinct_cells: usize,
    /// Records that overwrote an already-written coordinate.
    pub duplicates: usize,
    /// Records whose coordinate lies outside the matrix; skipped.
    pub out_of_bounds: usize,
}

impl Assembly {
    pub fn expected_cells(&self) -> usize {
        self.matrix.size() * self.matrix.size()
    }

    pub fn is_complete(&self) -> bool {
        self.distinct_cells == self.expected_cells()
    }
}

pub fn assemble(size: usize, records: &[ResultRecord]) -> EngineResult<Assembly> {
    let mut matrix = Matrix::zeros(size)?;
    let mut seen = HashSet::with_capacity(records.len());
    let mut duplicates = 0;
    let mut out_of_bounds = 0;

    for record in records {
        if !matrix.set(record.row, record.col, record.value) {
            out_of_bounds += 1;
            continue;
        }
        if !seen.insert((record.row, record.col)) {
            duplicates += 1;
        }
    }

    if duplicates > 0 {
        warn!(duplicates, "duplicate records found, last write kept");
    }
    if out_of_bounds > 0 {
        warn!(out_of_bounds, size, "records outside the matrix were skipped");
    }

    Ok(Assembly {
        matrix,
        distinct_cells: seen.len(),
        duplicates,
        out_of_bounds,
    })
}
