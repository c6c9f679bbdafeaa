//! Burn-in fuzzing for the YJIT compiler: many worker processes run random
//! benchmarks under random JIT flags and keep every genuine failure on disk.

pub mod catalog;
pub mod classify;
pub mod error;
pub mod executor;
pub mod preflight;
pub mod recorder;
pub mod sampler;
pub mod supervisor;
pub mod worker;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;

pub use catalog::{BenchmarkCatalog, BenchmarkEntry};
pub use classify::{FailureClassifier, SuppressionRule, Verdict};
pub use error::HarnessError;
pub use executor::{Executor, Invocation, ProcessExecutor, RunResult};
pub use recorder::{record, FailureReport};
pub use sampler::RunConfiguration;
pub use supervisor::{plan_workers, supervise, worker_command, WorkerPlan};
pub use worker::{StopSignal, Worker, WorkerOptions, WorkerState};

pub const DEFAULT_CATEGORIES: &str = "headline,other";
pub const DEFAULT_NUM_LONG_RUNS: usize = 4;

#[derive(Debug, Clone)]
pub struct BurnInConfig {
    pub num_procs: usize,
    pub num_long_runs: usize,
    pub categories: Vec<String>,
    pub no_yjit: bool,
    pub logs_dir: PathBuf,
    pub ruby: String,
    pub catalog: PathBuf,
    pub benchmarks_dir: PathBuf,
    pub harness_dir: PathBuf,
    pub seed: Option<u64>,
}

impl BurnInConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_procs == 0 {
            return Err(anyhow!("num-procs must be at least 1"));
        }
        supervisor::check_long_runs(self.num_procs, self.num_long_runs)?;
        if self.categories.is_empty() {
            return Err(anyhow!("at least one benchmark category is required"));
        }
        Ok(())
    }
}

/// Loads the catalog and keeps the benchmarks in the requested categories.
pub fn resolve_benchmarks(config: &BurnInConfig) -> Result<Vec<String>> {
    let catalog = BenchmarkCatalog::load(&config.catalog)?;
    let names = catalog.names_in_categories(&config.categories);
    if names.is_empty() {
        return Err(anyhow!(
            "no benchmarks in categories [{}] in {}",
            config.categories.join(", "),
            config.catalog.display()
        ));
    }
    Ok(names)
}

/// Startup checks that must pass before any worker is spawned. Returns the
/// runtime version string.
pub fn run_preflight(config: &BurnInConfig) -> Result<String> {
    let version = preflight::runtime_version(&config.ruby)?;
    if !config.no_yjit {
        preflight::check_jit_available(&config.ruby)?;
        preflight::check_jit_stats_available(&config.ruby)?;
    }
    preflight::prepare_logs_dir(&config.logs_dir)?;
    Ok(version)
}

/// Body of a worker process. Only returns on a harness error.
pub fn run_worker(
    executor: ProcessExecutor,
    index: usize,
    seed: Option<u64>,
    options: WorkerOptions,
) -> Result<WorkerState> {
    let seed = seed.unwrap_or_else(rand::random);
    info!(
        worker = index,
        pid = std::process::id(),
        seed,
        run_time_secs = options.run_time_secs,
        benchmarks = options.benchmarks.len(),
        "worker loop starting"
    );
    let mut worker = Worker::new(
        executor,
        FailureClassifier::default(),
        StdRng::seed_from_u64(seed),
        options,
    )?;
    worker.run(&StopSignal::new())
}
