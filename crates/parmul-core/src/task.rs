// TASK DECOMPOSER
// Splits a matrix pair into one independent unit of work per cell.
//
// INVARIANTS:
// 1. Exactly N * N tasks, emitted in row-major order
// 2. A shape mismatch yields an error and no tasks at all

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult, SinkError};
use crate::matrix::Matrix;

/// One elementwise multiplication for a single coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub row: usize,
    pub col: usize,
    pub a: i64,
    pub b: i64,
}

impl Task {
    pub fn execute(&self) -> EngineResult<ResultRecord> {
        let value = self
            .a
            .checked_mul(self.b)
            .ok_or(EngineError::ProductOverflow {
                row: self.row,
                col: self.col,
            })?;
        Ok(ResultRecord {
            row: self.row,
            col: self.col,
            value,
        })
    }
}

/// Output of one task, as stored in an aggregation sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultRecord {
    pub row: usize,
    pub col: usize,
    pub value: i64,
}

/// `row,col,value` with no trailing newline.
impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.row, self.col, self.value)
    }
}

impl FromStr for ResultRecord {
    type Err = SinkError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || SinkError::MalformedRecord {
            line: 0,
            content: line.to_string(),
        };
        let mut fields = line.trim().split(',');
        let row = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(malformed)?;
        let col = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(malformed)?;
        let value = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(malformed)?;
        if fields.next().is_some() {
            return Err(malformed());
        }
        Ok(ResultRecord { row, col, value })
    }
}

/// Produces one task per cell of `a` and `b` in row-major order.
pub fn decompose(a: &Matrix, b: &Matrix) -> EngineResult<Vec<Task>> {
    if a.size() != b.size() {
        return Err(EngineError::ShapeMismatch {
            left: a.size(),
            right: b.size(),
        });
    }

    let tasks = a
        .rows()
        .zip(b.rows())
        .enumerate()
        .flat_map(|(row, (left, right))| {
            left.iter()
                .zip(right)
                .enumerate()
                .map(move |(col, (&x, &y))| Task { row, col, a: x, b: y })
        })
        .collect();
    Ok(tasks)
}
