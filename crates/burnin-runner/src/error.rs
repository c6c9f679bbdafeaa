use std::path::PathBuf;
use thiserror::Error;

/// Failures of the burn-in harness itself, as opposed to a benchmark
/// misbehaving under test. These terminate the worker that hit them.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("benchmark script not found for '{benchmark}' (tried {})", .tried.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    ScriptNotFound {
        benchmark: String,
        tried: Vec<PathBuf>,
    },
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to capture benchmark output: {0}")]
    Capture(#[source] std::io::Error),
    #[error("failed to write failure report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
