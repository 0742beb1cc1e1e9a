// AGGREGATION SINK
// Shared append-only channel through which workers report results.
//
// SAFETY INVARIANTS:
// 1. `append` is atomic with respect to other appends (no torn or lost records)
// 2. `read_all` returns every record since the last `reset`, duplicates included
// 3. `reset` is idempotent
// 4. The sink never reorders or deduplicates; the assembler owns that policy

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::errors::SinkError;
use crate::task::ResultRecord;

pub trait AggregationSink: Send + Sync {
    /// Discards every record written so far.
    fn reset(&self) -> Result<(), SinkError>;

    /// Records one result. Safe to call from many workers at once.
    fn append(&self, record: ResultRecord) -> Result<(), SinkError>;

    /// Returns all records since the last reset, in storage order.
    fn read_all(&self) -> Result<Vec<ResultRecord>, SinkError>;
}

/// Purely in-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AggregationSink for MemorySink {
    fn reset(&self) -> Result<(), SinkError> {
        self.records.lock().clear();
        Ok(())
    }

    fn append(&self, record: ResultRecord) -> Result<(), SinkError> {
        self.records.lock().push(record);
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<ResultRecord>, SinkError> {
        Ok(self.records.lock().clone())
    }
}

/// Line-oriented file sink. Each append reopens the file in append mode and
/// writes one full `row,col,value` line while holding the sink lock.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl AggregationSink for FileSink {
    fn reset(&self) -> Result<(), SinkError> {
        let _guard = self.write_lock.lock();
        File::create(&self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "intermediate file truncated");
        Ok(())
    }

    fn append(&self, record: ResultRecord) -> Result<(), SinkError> {
        let line = format!("{}\n", record);
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| self.io_error(e))?;
        trace!(row = record.row, col = record.col, "record appended");
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<ResultRecord>, SinkError> {
        let _guard = self.write_lock.lock();
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = line.parse::<ResultRecord>().map_err(|_| {
                SinkError::MalformedRecord {
                    line: index + 1,
                    content: line.clone(),
                }
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn record(row: usize, col: usize, value: i64) -> ResultRecord {
        ResultRecord { row, col, value }
    }

    fn exercise_reset(sink: &dyn AggregationSink) {
        sink.append(record(0, 0, 1)).unwrap();
        sink.reset().unwrap();
        let once = sink.read_all().unwrap();
        sink.reset().unwrap();
        let twice = sink.read_all().unwrap();
        assert!(once.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_memory_sink_reset_is_idempotent() {
        exercise_reset(&MemorySink::new());
    }

    #[test]
    fn test_file_sink_reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        exercise_reset(&FileSink::new(dir.path().join("intermediate.txt")));
    }

    #[test]
    fn test_file_sink_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("intermediate.txt"));
        sink.reset().unwrap();
        sink.append(record(1, 0, 8)).unwrap();
        sink.append(record(0, 1, 0)).unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text, "1,0,8\n0,1,0\n");
        assert_eq!(
            sink.read_all().unwrap(),
            vec![record(1, 0, 8), record(0, 1, 0)]
        );
    }

    #[test]
    fn test_sinks_keep_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileSink::new(dir.path().join("dup.txt"));
        let memory = MemorySink::new();
        let sinks: [&dyn AggregationSink; 2] = [&file, &memory];
        for sink in sinks {
            sink.reset().unwrap();
            sink.append(record(0, 0, 1)).unwrap();
            sink.append(record(0, 0, 2)).unwrap();
            assert_eq!(sink.read_all().unwrap().len(), 2);
        }
        assert_eq!(memory.len(), 2);
        memory.reset().unwrap();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_file_sink_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("bad.txt"));
        std::fs::write(sink.path(), "0,0,1\n0;1;2\n").unwrap();
        match sink.read_all() {
            Err(SinkError::MalformedRecord { line, content }) => {
                assert_eq!(line, 2);
                assert_eq!(content, "0;1;2");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_file_sink_read_without_reset_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("missing").join("file.txt"));
        assert!(matches!(sink.read_all(), Err(SinkError::Io { .. })));
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let file: Arc<dyn AggregationSink> =
            Arc::new(FileSink::new(dir.path().join("concurrent.txt")));
        let memory: Arc<dyn AggregationSink> = Arc::new(MemorySink::new());

        for sink in [file, memory] {
            sink.reset().unwrap();
            let handles: Vec<_> = (0..8)
                .map(|row| {
                    let sink = Arc::clone(&sink);
                    thread::spawn(move || {
                        for col in 0..50 {
                            sink.append(record(row, col, (row * col) as i64)).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let mut records = sink.read_all().unwrap();
            records.sort_by_key(|r| (r.row, r.col));
            assert_eq!(records.len(), 400);
            records.dedup();
            assert_eq!(records.len(), 400);
        }
    }
}
