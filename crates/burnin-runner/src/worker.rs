use crate::classify::{FailureClassifier, Verdict};
use crate::executor::Executor;
use crate::recorder::{record, FailureReport};
use crate::sampler;
use anyhow::{anyhow, Result};
use chrono::Utc;
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Cooperative stop flag for `Worker::run`. Burn-in workers never raise it and
/// are killed externally instead.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub benchmarks: Vec<String>,
    pub run_time_secs: u64,
    pub jit_disabled: bool,
    pub logs_dir: PathBuf,
    pub runtime_version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerState {
    pub ever_failed: bool,
    pub iterations: u64,
    pub failures: u64,
}

pub struct Worker<E, R> {
    executor: E,
    classifier: FailureClassifier,
    rng: R,
    options: WorkerOptions,
    state: WorkerState,
}

impl<E: Executor, R: Rng> Worker<E, R> {
    pub fn new(
        executor: E,
        classifier: FailureClassifier,
        rng: R,
        options: WorkerOptions,
    ) -> Result<Self> {
        if options.benchmarks.is_empty() {
            return Err(anyhow!("worker needs at least one benchmark"));
        }
        Ok(Self {
            executor,
            classifier,
            rng,
            options,
            state: WorkerState::default(),
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// One burn-in iteration: pick, configure, run, classify, maybe record.
    pub fn step(&mut self) -> Result<Verdict> {
        let idx = self.rng.gen_range(0..self.options.benchmarks.len());
        let benchmark = self.options.benchmarks[idx].clone();
        let config = sampler::sample(&mut self.rng, !self.options.jit_disabled);

        let result = self.executor.execute(
            &benchmark,
            &config,
            self.options.run_time_secs,
            self.options.jit_disabled,
        )?;
        self.state.iterations += 1;

        let verdict = self.classifier.verdict(&benchmark, &result);
        match verdict {
            Verdict::Passed => {}
            Verdict::Suppressed => {
                debug!(benchmark = %benchmark, "suppressed known concurrent-run failure");
            }
            Verdict::Failed => {
                self.state.ever_failed = true;
                self.state.failures += 1;
                println!();
                println!("ERROR: {} failed at {}", benchmark, Utc::now().to_rfc3339());
                let report = FailureReport {
                    runtime_version: self.options.runtime_version.clone(),
                    pid: result.pid,
                    command: result.command,
                    output: result.output,
                };
                let path = record(&self.options.logs_dir, &benchmark, &report)?;
                info!(benchmark = %benchmark, path = %path.display(), "failure recorded");
            }
        }
        Ok(verdict)
    }

    /// Iterates until `stop` is raised. Failures are recorded and the loop
    /// keeps going; only harness errors end it early.
    pub fn run(&mut self, stop: &StopSignal) -> Result<WorkerState> {
        while !stop.is_stopped() {
            self.step()?;
            if self.state.ever_failed {
                println!("ERROR ENCOUNTERED");
            }
        }
        Ok(self.state)
    }
}
