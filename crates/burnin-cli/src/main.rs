use anyhow::Result;
use burnin_runner::{
    catalog::parse_name_list, BurnInConfig, ProcessExecutor, WorkerOptions, WorkerPlan,
};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "burn-in", version = "0.3.0", about = "YJIT burn-in fuzzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct RuntimeArgs {
    #[arg(long, default_value = "ruby")]
    ruby: String,
    #[arg(long, default_value = "benchmarks")]
    benchmarks_dir: PathBuf,
    #[arg(long, default_value = "harness")]
    harness_dir: PathBuf,
    #[arg(long, default_value = "logs_burn_in")]
    logs_path: PathBuf,
    #[arg(long)]
    no_yjit: bool,
}

#[derive(Args, Clone)]
struct PlanArgs {
    #[arg(long)]
    num_procs: Option<usize>,
    #[arg(long)]
    num_long_runs: Option<usize>,
    #[arg(long, default_value = burnin_runner::DEFAULT_CATEGORIES)]
    categories: String,
    #[arg(long, default_value = "benchmarks.yml")]
    catalog: PathBuf,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn the worker processes and keep them running until killed.
    Run {
        #[command(flatten)]
        plan: PlanArgs,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Show the benchmarks and worker plan a run would use.
    Describe {
        #[command(flatten)]
        plan: PlanArgs,
        #[command(flatten)]
        runtime: RuntimeArgs,
        #[arg(long)]
        json: bool,
    },
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        index: usize,
        #[arg(long)]
        run_time_secs: u64,
        #[arg(long)]
        benchmarks: String,
        #[arg(long)]
        runtime_version: String,
        #[arg(long)]
        seed: Option<u64>,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run_command(cli.command)
}

fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run { plan, runtime } => {
            let config = build_config(&plan, &runtime);
            config.validate()?;
            let benchmarks = burnin_runner::resolve_benchmarks(&config)?;
            let plans =
                burnin_runner::plan_workers(config.num_procs, config.num_long_runs, config.seed)?;
            let runtime_version = burnin_runner::run_preflight(&config)?;
            info!(
                runtime = %runtime_version,
                benchmarks = benchmarks.len(),
                workers = config.num_procs,
                long_workers = config.num_long_runs,
                logs_path = %config.logs_dir.display(),
                "burn-in starting"
            );
            let exe = std::env::current_exe()?;
            burnin_runner::supervise(&exe, &config, &plans, &benchmarks, &runtime_version)?;
        }
        Commands::Describe {
            plan,
            runtime,
            json,
        } => {
            let config = build_config(&plan, &runtime);
            config.validate()?;
            let benchmarks = burnin_runner::resolve_benchmarks(&config)?;
            let plans =
                burnin_runner::plan_workers(config.num_procs, config.num_long_runs, config.seed)?;
            if json {
                let payload = describe_to_json(&config, &benchmarks, &plans);
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }
            print_describe(&config, &benchmarks, &plans);
        }
        Commands::Worker {
            index,
            run_time_secs,
            benchmarks,
            runtime_version,
            seed,
            runtime,
        } => {
            let (executor, options) =
                worker_parts(&runtime, run_time_secs, &benchmarks, runtime_version);
            burnin_runner::run_worker(executor, index, seed, options)?;
        }
    }
    Ok(())
}

fn default_num_procs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn build_config(plan: &PlanArgs, runtime: &RuntimeArgs) -> BurnInConfig {
    let num_procs = plan.num_procs.unwrap_or_else(default_num_procs);
    BurnInConfig {
        num_procs,
        // An explicit value is validated as given; the default shrinks to fit.
        num_long_runs: plan
            .num_long_runs
            .unwrap_or(burnin_runner::DEFAULT_NUM_LONG_RUNS.min(num_procs)),
        categories: parse_name_list(&plan.categories),
        no_yjit: runtime.no_yjit,
        logs_dir: runtime.logs_path.clone(),
        ruby: runtime.ruby.clone(),
        catalog: plan.catalog.clone(),
        benchmarks_dir: runtime.benchmarks_dir.clone(),
        harness_dir: runtime.harness_dir.clone(),
        seed: plan.seed,
    }
}

fn worker_parts(
    runtime: &RuntimeArgs,
    run_time_secs: u64,
    benchmarks: &str,
    runtime_version: String,
) -> (ProcessExecutor, WorkerOptions) {
    let executor = ProcessExecutor::new(
        runtime.ruby.clone(),
        &runtime.benchmarks_dir,
        &runtime.harness_dir,
    );
    let options = WorkerOptions {
        benchmarks: parse_name_list(benchmarks),
        run_time_secs,
        jit_disabled: runtime.no_yjit,
        logs_dir: runtime.logs_path.clone(),
        runtime_version,
    };
    (executor, options)
}

fn describe_to_json(config: &BurnInConfig, benchmarks: &[String], plans: &[WorkerPlan]) -> Value {
    json!({
        "ok": true,
        "command": "describe",
        "ruby": config.ruby,
        "yjit": !config.no_yjit,
        "categories": config.categories,
        "catalog": config.catalog.display().to_string(),
        "logs_path": config.logs_dir.display().to_string(),
        "benchmarks": benchmarks,
        "workers": plans.iter().map(|p| json!({
            "index": p.index,
            "run_time_secs": p.run_time_secs,
            "long": p.is_long(),
            "seed": p.seed,
        })).collect::<Vec<_>>(),
    })
}

fn print_describe(config: &BurnInConfig, benchmarks: &[String], plans: &[WorkerPlan]) {
    println!("ruby: {}", config.ruby);
    println!("yjit: {}", !config.no_yjit);
    println!("categories: {}", config.categories.join(","));
    println!("catalog: {}", config.catalog.display());
    println!("logs_path: {}", config.logs_dir.display());
    println!("benchmarks ({}): {}", benchmarks.len(), benchmarks.join(" "));
    for p in plans {
        println!(
            "worker {}: run_time_secs={} long={}{}",
            p.index,
            p.run_time_secs,
            p.is_long(),
            p.seed.map(|s| format!(" seed={}", s)).unwrap_or_default()
        );
    }
}
