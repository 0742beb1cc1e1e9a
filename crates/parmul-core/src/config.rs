// Engine and production-loop settings.
//
// Defaults reproduce the stock continuous run: 3x3 matrices with entries in
// [1, 10], 100 rounds, 2 second pause, file-backed sink.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

pub const DEFAULT_INTERMEDIATE_FILE: &str = "intermediate_file_async.txt";
/// Intermediate file for one-shot `multiply` rounds, kept apart from the
/// continuous loop's file so both can run in the same directory.
pub const DEFAULT_ONESHOT_INTERMEDIATE_FILE: &str = "intermediate_file_threads.txt";
pub const DEFAULT_RESULT_LOG: &str = "result_matrix_async.txt";
const ENV_PREFIX: &str = "PARMUL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkKind {
    File { path: PathBuf },
    Memory,
}

impl Default for SinkKind {
    fn default() -> Self {
        SinkKind::File {
            path: PathBuf::from(DEFAULT_INTERMEDIATE_FILE),
        }
    }
}

/// What to do when fewer than N * N distinct cells reach the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCellPolicy {
    /// Fail the round with `IncompleteRound`.
    #[default]
    Strict,
    /// Keep the missing cells at zero and log a warning.
    ZeroFill,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pool width; `None` uses the available parallelism.
    pub workers: Option<usize>,
    pub sink: SinkKind,
    pub missing_cells: MissingCellPolicy,
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.workers == Some(0) {
            return Err(EngineError::InvalidWorkers);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    pub size: usize,
    pub min_value: i64,
    pub max_value: i64,
    pub iterations: u64,
    pub delay_secs: u64,
    pub result_log: PathBuf,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
    /// Print operands and result of every round.
    pub echo: bool,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            size: 3,
            min_value: 1,
            max_value: 10,
            iterations: 100,
            delay_secs: 2,
            result_log: PathBuf::from(DEFAULT_RESULT_LOG),
            seed: None,
            echo: false,
        }
    }
}

impl ProductionConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.size == 0 {
            return Err(EngineError::Empty);
        }
        if self.min_value > self.max_value {
            return Err(EngineError::InvalidRange {
                min: self.min_value,
                max: self.max_value,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub production: ProductionConfig,
}

impl Settings {
    /// Layers an optional TOML file under `PARMUL_*` environment variables
    /// (`PARMUL_PRODUCTION__SIZE=4`, `PARMUL_ENGINE__WORKERS=8`, ...).
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| EngineError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.engine.validate()?;
        self.production.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.production.size, 3);
        assert_eq!(settings.production.iterations, 100);
        assert_eq!(settings.production.delay_secs, 2);
        assert_eq!(settings.engine.missing_cells, MissingCellPolicy::Strict);
        assert_eq!(
            settings.engine.sink,
            SinkKind::File {
                path: PathBuf::from(DEFAULT_INTERMEDIATE_FILE)
            }
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parmul.toml");
        std::fs::write(
            &path,
            r#"
[engine]
workers = 4
missing_cells = "zero_fill"

[engine.sink]
kind = "memory"

[production]
size = 5
iterations = 3
delay_secs = 0
seed = 9
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.engine.workers, Some(4));
        assert_eq!(settings.engine.sink, SinkKind::Memory);
        assert_eq!(settings.engine.missing_cells, MissingCellPolicy::ZeroFill);
        assert_eq!(settings.production.size, 5);
        assert_eq!(settings.production.seed, Some(9));
        assert_eq!(settings.production.min_value, 1);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[production]\nmin_value = 10\nmax_value = 1\n").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(EngineError::InvalidRange { min: 10, max: 1 })
        ));
    }

    #[test]
    fn test_zero_workers_invalid() {
        let engine = EngineConfig {
            workers: Some(0),
            ..EngineConfig::default()
        };
        assert!(matches!(engine.validate(), Err(EngineError::InvalidWorkers)));
    }
}
