// MATRIX
// Dense square integer matrix shared by every stage of a round.
//
// INVARIANTS:
// 1. Row count equals column count, size >= 1
// 2. Cells are stored row-major in a single buffer of size * size entries

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Matrix {
    size: usize,
    cells: Vec<i64>,
}

impl Matrix {
    /// Zero-filled `size` x `size` matrix.
    pub fn zeros(size: usize) -> EngineResult<Self> {
        if size == 0 {
            return Err(EngineError::Empty);
        }
        Ok(Self {
            size,
            cells: vec![0; size * size],
        })
    }

    /// Builds a matrix from rows, rejecting ragged or non-square input.
    pub fn from_rows(rows: Vec<Vec<i64>>) -> EngineResult<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(EngineError::Empty);
        }
        let mut cells = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return Err(EngineError::NotSquare {
                    rows: size,
                    cols: row.len(),
                });
            }
            cells.extend(row);
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> Option<i64> {
        if row < self.size && col < self.size {
            Some(self.cells[row * self.size + col])
        } else {
            None
        }
    }

    /// Writes a cell. Returns false when the coordinate is out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: i64) -> bool {
        if row < self.size && col < self.size {
            self.cells[row * self.size + col] = value;
            true
        } else {
            false
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i64]> {
        self.cells.chunks(self.size)
    }

    pub fn to_rows(&self) -> Vec<Vec<i64>> {
        self.rows().map(<[i64]>::to_vec).collect()
    }

    /// Straightforward single-threaded elementwise product, used as the
    /// reference the pooled engine is checked against.
    pub fn hadamard(&self, other: &Matrix) -> EngineResult<Matrix> {
        if self.size != other.size {
            return Err(EngineError::ShapeMismatch {
                left: self.size,
                right: other.size,
            });
        }
        let mut cells = Vec::with_capacity(self.cells.len());
        for (index, (a, b)) in self.cells.iter().zip(&other.cells).enumerate() {
            let value = a.checked_mul(*b).ok_or(EngineError::ProductOverflow {
                row: index / self.size,
                col: index % self.size,
            })?;
            cells.push(value);
        }
        Ok(Matrix {
            size: self.size,
            cells,
        })
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let mut first = true;
            for value in row {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{}", value)?;
                first = false;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

impl FromStr for Matrix {
    type Err = EngineError;

    /// Parses whitespace-delimited rows, one per line. Blank lines are skipped.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut rows = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<i64>().map_err(|e| EngineError::Parse {
                        line: index + 1,
                        reason: format!("{:?}: {}", token, e),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        Matrix::from_rows(rows)
    }
}
