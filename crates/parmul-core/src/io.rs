use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{EngineError, EngineResult};
use crate::matrix::Matrix;

fn io_error(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads a whitespace-delimited matrix dump.
pub fn read_matrix(path: impl AsRef<Path>) -> EngineResult<Matrix> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    text.parse()
}

/// Writes a matrix, replacing any previous file content.
pub fn write_matrix(path: impl AsRef<Path>, matrix: &Matrix) -> EngineResult<()> {
    let path = path.as_ref();
    fs::write(path, matrix.to_string()).map_err(|e| io_error(path, e))
}

/// Splits a result log back into its matrices.
pub fn read_result_log(path: impl AsRef<Path>) -> EngineResult<Vec<Matrix>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;

    let mut matrices = Vec::new();
    let mut block = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                matrices.push(block.parse()?);
                block.clear();
            }
            continue;
        }
        block.push_str(line);
        block.push('\n');
    }
    if !block.is_empty() {
        matrices.push(block.parse()?);
    }
    Ok(matrices)
}

/// Append-only log of assembled matrices, one blank line between rounds.
#[derive(Debug)]
pub struct ResultLog {
    path: PathBuf,
    entries: usize,
}

impl ResultLog {
    /// Opens the log and truncates it. Called once at process start.
    pub fn create(path: impl Into<PathBuf>) -> EngineResult<Self> {
        let path = path.into();
        File::create(&path).map_err(|e| io_error(&path, e))?;
        debug!(path = %path.display(), "result log truncated");
        Ok(Self { path, entries: 0 })
    }

    pub fn append(&mut self, matrix: &Matrix) -> EngineResult<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;

        let mut chunk = String::new();
        if self.entries > 0 {
            chunk.push('\n');
        }
        chunk.push_str(&matrix.to_string());
        file.write_all(chunk.as_bytes())
            .map_err(|e| io_error(&self.path, e))?;

        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
