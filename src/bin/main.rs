use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parmul_core::config::{DEFAULT_INTERMEDIATE_FILE, DEFAULT_ONESHOT_INTERMEDIATE_FILE};
use parmul_core::{
    generate_random, read_matrix, write_matrix, Engine, MissingCellPolicy, ProductionLoop,
    RoundView, Settings, SinkKind,
};

#[derive(Parser)]
#[command(name = "parmul")]
#[command(about = "Pooled elementwise matrix products", long_about = None)]
struct Cli {
    /// TOML settings file; command-line flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Multiply two matrix files elementwise in a single round
    Multiply {
        #[arg(long)]
        a: PathBuf,
        #[arg(long)]
        b: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Write a random square matrix
    Generate {
        #[arg(long)]
        size: usize,
        #[arg(long, default_value_t = 1)]
        min: i64,
        #[arg(long, default_value_t = 10)]
        max: i64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Generate and multiply pairs continuously, appending to a result log
    Run {
        #[arg(long)]
        size: Option<usize>,
        #[arg(long)]
        iterations: Option<u64>,
        /// Seconds to pause between rounds
        #[arg(long)]
        delay: Option<u64>,
        #[arg(long)]
        result_log: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        /// Print operands and result of every round
        #[arg(long)]
        echo: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkArg {
    File,
    Memory,
}

#[derive(clap::Args)]
struct EngineArgs {
    /// Pool width; defaults to the available parallelism
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long, value_enum)]
    sink: Option<SinkArg>,
    /// Intermediate record file for the file sink
    #[arg(long)]
    intermediate: Option<PathBuf>,
    /// Leave missing cells at zero instead of failing the round
    #[arg(long)]
    legacy_zero_fill: bool,
}

impl EngineArgs {
    /// Overrides `settings.engine`; `fallback` is the intermediate file used
    /// when `--sink file` is requested without any path on record.
    fn apply(self, settings: &mut Settings, fallback: &str) {
        let engine = &mut settings.engine;
        if let Some(workers) = self.workers {
            engine.workers = Some(workers);
        }
        let current_path = match &engine.sink {
            SinkKind::File { path } => Some(path.clone()),
            SinkKind::Memory => None,
        };
        match (self.sink, self.intermediate) {
            (Some(SinkArg::Memory), _) => engine.sink = SinkKind::Memory,
            (Some(SinkArg::File), path) => {
                let path = path
                    .or(current_path)
                    .unwrap_or_else(|| PathBuf::from(fallback));
                engine.sink = SinkKind::File { path };
            }
            (None, Some(path)) => engine.sink = SinkKind::File { path },
            (None, None) => {}
        }
        if self.legacy_zero_fill {
            engine.missing_cells = MissingCellPolicy::ZeroFill;
        }
    }
}

/// One-shot rounds write their records to their own intermediate file unless
/// the settings file or environment chose a sink explicitly.
fn apply_multiply_args(engine: EngineArgs, settings: &mut Settings) {
    if settings.engine.sink == SinkKind::default() {
        settings.engine.sink = SinkKind::File {
            path: PathBuf::from(DEFAULT_ONESHOT_INTERMEDIATE_FILE),
        };
    }
    engine.apply(settings, DEFAULT_ONESHOT_INTERMEDIATE_FILE);
}

fn print_round(view: RoundView<'_>) {
    println!("Round {}", view.iteration + 1);
    print!("Matrix A:\n{}", view.a);
    print!("Matrix B:\n{}", view.b);
    println!("Result:\n{}", view.product);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Commands::Multiply {
            a,
            b,
            output,
            engine,
        } => {
            apply_multiply_args(engine, &mut settings);
            let matrix_a = read_matrix(&a).with_context(|| format!("reading {}", a.display()))?;
            let matrix_b = read_matrix(&b).with_context(|| format!("reading {}", b.display()))?;

            let engine = Engine::from_config(&settings.engine)?;
            let outcome = engine.round(&matrix_a, &matrix_b)?;
            write_matrix(&output, &outcome.matrix)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(
                output = %output.display(),
                workers = outcome.report.workers,
                "product written"
            );
        }
        Commands::Generate {
            size,
            min,
            max,
            seed,
            output,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let matrix = generate_random(&mut rng, size, min, max)?;
            write_matrix(&output, &matrix)
                .with_context(|| format!("writing {}", output.display()))?;
        }
        Commands::Run {
            size,
            iterations,
            delay,
            result_log,
            seed,
            echo,
            engine,
        } => {
            engine.apply(&mut settings, DEFAULT_INTERMEDIATE_FILE);
            let production = &mut settings.production;
            if let Some(size) = size {
                production.size = size;
            }
            if let Some(iterations) = iterations {
                production.iterations = iterations;
            }
            if let Some(delay) = delay {
                production.delay_secs = delay;
            }
            if let Some(path) = result_log {
                production.result_log = path;
            }
            if seed.is_some() {
                production.seed = seed;
            }
            production.echo |= echo;

            let engine = Engine::from_config(&settings.engine)?;
            let mut production = ProductionLoop::new(engine, settings.production.clone())?;
            if settings.production.echo {
                production = production.on_round(print_round);
            }
            let summary = production.run()?;
            println!("Completed {} rounds", summary.rounds);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parmul_core::read_result_log;

    fn parse<const N: usize>(args: [&str; N]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_engine_flags_override_settings() {
        let cli = parse([
            "parmul",
            "multiply",
            "--a",
            "a.txt",
            "--b",
            "b.txt",
            "-o",
            "out.txt",
            "--workers",
            "4",
            "--sink",
            "memory",
            "--legacy-zero-fill",
        ]);

        let mut settings = Settings::default();
        match cli.command {
            Commands::Multiply { engine, .. } => apply_multiply_args(engine, &mut settings),
            _ => panic!("expected multiply"),
        }
        assert_eq!(settings.engine.workers, Some(4));
        assert_eq!(settings.engine.sink, SinkKind::Memory);
        assert_eq!(settings.engine.missing_cells, MissingCellPolicy::ZeroFill);
    }

    #[test]
    fn test_intermediate_path_selects_file_sink() {
        let cli = parse([
            "parmul",
            "run",
            "--iterations",
            "3",
            "--intermediate",
            "records.txt",
        ]);

        let mut settings = Settings::default();
        settings.engine.sink = SinkKind::Memory;
        match cli.command {
            Commands::Run { engine, iterations, .. } => {
                assert_eq!(iterations, Some(3));
                engine.apply(&mut settings, DEFAULT_INTERMEDIATE_FILE);
            }
            _ => panic!("expected run"),
        }
        assert_eq!(
            settings.engine.sink,
            SinkKind::File {
                path: PathBuf::from("records.txt")
            }
        );
    }

    #[test]
    fn test_multiply_and_run_use_separate_intermediate_files() {
        let oneshot = parse(["parmul", "multiply", "--a", "a", "--b", "b", "-o", "c"]);
        let mut settings = Settings::default();
        match oneshot.command {
            Commands::Multiply { engine, .. } => apply_multiply_args(engine, &mut settings),
            _ => panic!("expected multiply"),
        }
        assert_eq!(
            settings.engine.sink,
            SinkKind::File {
                path: PathBuf::from(DEFAULT_ONESHOT_INTERMEDIATE_FILE)
            }
        );

        let forced = parse([
            "parmul", "multiply", "--a", "a", "--b", "b", "-o", "c", "--sink", "file",
        ]);
        let mut settings = Settings::default();
        settings.engine.sink = SinkKind::Memory;
        match forced.command {
            Commands::Multiply { engine, .. } => apply_multiply_args(engine, &mut settings),
            _ => panic!("expected multiply"),
        }
        assert_eq!(
            settings.engine.sink,
            SinkKind::File {
                path: PathBuf::from(DEFAULT_ONESHOT_INTERMEDIATE_FILE)
            }
        );

        let continuous = parse(["parmul", "run"]);
        let mut settings = Settings::default();
        match continuous.command {
            Commands::Run { engine, .. } => engine.apply(&mut settings, DEFAULT_INTERMEDIATE_FILE),
            _ => panic!("expected run"),
        }
        assert_eq!(
            settings.engine.sink,
            SinkKind::File {
                path: PathBuf::from(DEFAULT_INTERMEDIATE_FILE)
            }
        );
        assert_ne!(DEFAULT_INTERMEDIATE_FILE, DEFAULT_ONESHOT_INTERMEDIATE_FILE);
    }

    #[test]
    fn test_run_multiply_command() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let out = dir.path().join("out.txt");
        let records = dir.path().join("records.txt");
        std::fs::write(&a, "2 3\n4 5\n").unwrap();
        std::fs::write(&b, "1 0\n2 2\n").unwrap();

        let cli = parse([
            "parmul",
            "multiply",
            "--a",
            a.to_str().unwrap(),
            "--b",
            b.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
            "--workers",
            "2",
            "--intermediate",
            records.to_str().unwrap(),
        ]);
        run(cli).unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "2 0\n8 10\n");
        let mut lines: Vec<_> = std::fs::read_to_string(&records)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect();
        lines.sort();
        assert_eq!(lines, vec!["0,0,2", "0,1,0", "1,0,8", "1,1,10"]);
    }

    #[test]
    fn test_run_multiply_rejects_mismatched_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let out = dir.path().join("out.txt");
        std::fs::write(&a, "2 3\n4 5\n").unwrap();
        std::fs::write(&b, "1 2 3\n4 5 6\n7 8 9\n").unwrap();

        let cli = parse([
            "parmul",
            "multiply",
            "--a",
            a.to_str().unwrap(),
            "--b",
            b.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
            "--sink",
            "memory",
        ]);
        assert!(run(cli).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn test_run_continuous_command() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");

        for (log, extra) in [(&first, "--echo"), (&second, "--workers=1")] {
            let cli = parse([
                "parmul",
                "run",
                "--size",
                "2",
                "--iterations",
                "2",
                "--delay",
                "0",
                "--seed",
                "1",
                "--sink",
                "memory",
                extra,
                "--result-log",
                log.to_str().unwrap(),
            ]);
            run(cli).unwrap();
        }

        let rounds = read_result_log(&first).unwrap();
        assert_eq!(rounds.len(), 2);
        for matrix in &rounds {
            assert_eq!(matrix.size(), 2);
            assert!(matrix.rows().flatten().all(|v| (1..=100).contains(v)));
        }
        // Same seed, same rounds, whatever the pool width or echo setting.
        assert_eq!(read_result_log(&second).unwrap(), rounds);
    }
}
