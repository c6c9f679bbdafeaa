use crate::BurnInConfig;
use anyhow::{anyhow, Result};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

pub const LONG_RUN_SECS: u64 = 2 * 60 * 60;
pub const SHORT_RUN_SECS: u64 = 10;
pub const IDLE_PERIOD: Duration = Duration::from_secs(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPlan {
    pub index: usize,
    pub run_time_secs: u64,
    pub seed: Option<u64>,
}

impl WorkerPlan {
    pub fn is_long(&self) -> bool {
        self.run_time_secs == LONG_RUN_SECS
    }
}

pub fn check_long_runs(num_procs: usize, num_long_runs: usize) -> Result<()> {
    if num_long_runs > num_procs {
        return Err(anyhow!(
            "num-long-runs ({}) cannot exceed num-procs ({})",
            num_long_runs,
            num_procs
        ));
    }
    Ok(())
}

/// The first `num_long_runs` workers get the long budget, the rest the short.
pub fn plan_workers(
    num_procs: usize,
    num_long_runs: usize,
    base_seed: Option<u64>,
) -> Result<Vec<WorkerPlan>> {
    check_long_runs(num_procs, num_long_runs)?;
    Ok((0..num_procs)
        .map(|index| WorkerPlan {
            index,
            run_time_secs: if index < num_long_runs {
                LONG_RUN_SECS
            } else {
                SHORT_RUN_SECS
            },
            seed: base_seed.map(|s| s.wrapping_add(index as u64)),
        })
        .collect())
}

/// Command line that re-enters the `worker` subcommand of `exe`.
pub fn worker_command(
    exe: &Path,
    config: &BurnInConfig,
    plan: &WorkerPlan,
    benchmarks: &[String],
    runtime_version: &str,
) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg("worker")
        .arg("--index")
        .arg(plan.index.to_string())
        .arg("--run-time-secs")
        .arg(plan.run_time_secs.to_string())
        .arg("--benchmarks")
        .arg(benchmarks.join(","))
        .arg("--runtime-version")
        .arg(runtime_version)
        .arg("--logs-path")
        .arg(&config.logs_dir)
        .arg("--ruby")
        .arg(&config.ruby)
        .arg("--benchmarks-dir")
        .arg(&config.benchmarks_dir)
        .arg("--harness-dir")
        .arg(&config.harness_dir);
    if config.no_yjit {
        cmd.arg("--no-yjit");
    }
    if let Some(seed) = plan.seed {
        cmd.arg("--seed").arg(seed.to_string());
    }
    cmd.stdin(Stdio::null());
    cmd
}

struct RunningWorker {
    plan: WorkerPlan,
    child: Child,
    exit: Option<ExitStatus>,
}

/// Spawns one process per plan, then idles forever as the anchor of the
/// process group. Workers are never signalled or restarted from here.
pub fn supervise(
    exe: &Path,
    config: &BurnInConfig,
    plans: &[WorkerPlan],
    benchmarks: &[String],
    runtime_version: &str,
) -> Result<()> {
    let mut workers = spawn_all(plans, |plan| {
        worker_command(exe, config, plan, benchmarks, runtime_version)
    })?;

    loop {
        thread::sleep(IDLE_PERIOD);
        for worker in workers.iter_mut().filter(|w| w.exit.is_none()) {
            match worker.child.try_wait() {
                Ok(Some(status)) => {
                    warn!(
                        worker = worker.plan.index,
                        long = worker.plan.is_long(),
                        %status,
                        "worker exited"
                    );
                    worker.exit = Some(status);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(worker = worker.plan.index, error = %e, "failed to poll worker");
                }
            }
        }
    }
}

/// All-or-nothing: if any spawn fails, the workers already started are killed
/// and reaped before the error is returned.
fn spawn_all<F>(plans: &[WorkerPlan], mut command_for: F) -> Result<Vec<RunningWorker>>
where
    F: FnMut(&WorkerPlan) -> Command,
{
    let mut workers = Vec::with_capacity(plans.len());
    for plan in plans {
        match command_for(plan).spawn() {
            Ok(child) => {
                info!(
                    worker = plan.index,
                    pid = child.id(),
                    run_time_secs = plan.run_time_secs,
                    "worker started"
                );
                workers.push(RunningWorker {
                    plan: *plan,
                    child,
                    exit: None,
                });
            }
            Err(e) => {
                reap_all(&mut workers);
                return Err(anyhow!("failed to spawn worker {}: {}", plan.index, e));
            }
        }
    }
    Ok(workers)
}

fn reap_all(workers: &mut [RunningWorker]) {
    for worker in workers.iter_mut() {
        if let Err(e) = worker.child.kill() {
            warn!(worker = worker.plan.index, error = %e, "failed to kill worker");
        }
        match worker.child.wait() {
            Ok(status) => worker.exit = Some(status),
            Err(e) => warn!(worker = worker.plan.index, error = %e, "failed to reap worker"),
        }
    }
}
