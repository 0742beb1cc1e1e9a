use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of an aggregation sink. Any of these aborts the current round.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed record at line {line}: {content:?}")]
    MalformedRecord { line: usize, content: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("shape mismatch: left operand is {left}x{left}, right operand is {right}x{right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("matrix is not square: {rows} rows, {cols} columns")]
    NotSquare { rows: usize, cols: usize },

    #[error("matrix has no cells")]
    Empty,

    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("invalid generation range: min {min} is greater than max {max}")]
    InvalidRange { min: i64, max: i64 },

    #[error("pool width must be at least 1")]
    InvalidWorkers,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("product at ({row}, {col}) overflows a 64-bit integer")]
    ProductOverflow { row: usize, col: usize },

    #[error("round incomplete: expected {expected} cells, sink held {written}")]
    IncompleteRound { expected: usize, written: usize },

    #[error("matrix I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type EngineResult<T> = Result<T, EngineError>;
