// PRODUCTION LOOP
// Continuous variant: generate a pair, run a round, append the product to the
// result log, pause, repeat for the configured number of iterations.
//
// INVARIANTS:
// 1. The result log is truncated once, before the first iteration
// 2. Only the result log outlives a round; the sink is reset by every round
// 3. Any error aborts the loop; there is no catch-and-continue
// 4. The pause is unconditional and not cancellable

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::ProductionConfig;
use crate::engine::Engine;
use crate::errors::EngineResult;
use crate::generator::generate_random;
use crate::io::ResultLog;
use crate::matrix::Matrix;

/// Throttling primitive between rounds.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Operands and product of one completed round, handed to the round observer.
#[derive(Debug, Clone, Copy)]
pub struct RoundView<'a> {
    pub iteration: u64,
    pub a: &'a Matrix,
    pub b: &'a Matrix,
    pub product: &'a Matrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionSummary {
    pub rounds: u64,
    pub cells_written: u64,
}

pub struct ProductionLoop {
    engine: Engine,
    config: ProductionConfig,
    pause: Box<dyn Pause + Send>,
    observer: Option<Box<dyn FnMut(RoundView<'_>) + Send>>,
}

impl ProductionLoop {
    pub fn new(engine: Engine, config: ProductionConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            pause: Box::new(ThreadSleep),
            observer: None,
        })
    }

    pub fn with_pause(mut self, pause: impl Pause + Send + 'static) -> Self {
        self.pause = Box::new(pause);
        self
    }

    /// Called after every round once its product is in the result log.
    pub fn on_round(mut self, observer: impl FnMut(RoundView<'_>) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Runs with a generator seeded from `config.seed`, or from entropy.
    pub fn run(&mut self) -> EngineResult<ProductionSummary> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.run_with_rng(&mut rng)
    }

    pub fn run_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> EngineResult<ProductionSummary> {
        let cfg = &self.config;
        let mut log = ResultLog::create(&cfg.result_log)?;
        let delay = Duration::from_secs(cfg.delay_secs);

        info!(
            iterations = cfg.iterations,
            size = cfg.size,
            workers = self.engine.workers(),
            log = %log.path().display(),
            "production loop started"
        );

        let mut summary = ProductionSummary {
            rounds: 0,
            cells_written: 0,
        };
        for iteration in 0..cfg.iterations {
            let a = generate_random(rng, cfg.size, cfg.min_value, cfg.max_value)?;
            let b = generate_random(rng, cfg.size, cfg.min_value, cfg.max_value)?;

            let outcome = self.engine.round(&a, &b)?;
            log.append(&outcome.matrix)?;

            if let Some(observer) = self.observer.as_mut() {
                observer(RoundView {
                    iteration,
                    a: &a,
                    b: &b,
                    product: &outcome.matrix,
                });
            }

            summary.rounds += 1;
            summary.cells_written += outcome.report.distinct_cells as u64;
            debug!(iteration, "round appended to result log");

            self.pause.pause(delay);
        }

        info!(rounds = summary.rounds, "production loop finished");
        Ok(summary)
    }
}
