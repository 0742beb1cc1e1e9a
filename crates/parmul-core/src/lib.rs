// === Data ===
pub mod matrix;
pub mod task;

// === Compute & Aggregate ===
pub mod pool;
pub mod sink;
pub mod assembler;
pub mod engine;

// === Continuous Variant ===
pub mod production;

// === Collaborators ===
pub mod generator;
pub mod io;

pub mod config;
pub mod errors;

// === Re-exports ===
pub use assembler::{assemble, Assembly};
pub use config::{EngineConfig, MissingCellPolicy, ProductionConfig, Settings, SinkKind};
pub use engine::{Engine, RoundOutcome, RoundReport};
pub use errors::{EngineError, EngineResult, SinkError};
pub use generator::generate_random;
pub use io::{read_matrix, read_result_log, write_matrix, ResultLog};
pub use matrix::Matrix;
pub use pool::{available_parallelism, DispatchReport, WorkerPool};
pub use production::{Pause, ProductionLoop, ProductionSummary, RoundView, ThreadSleep};
pub use sink::{AggregationSink, FileSink, MemorySink};
pub use task::{decompose, ResultRecord, Task};
