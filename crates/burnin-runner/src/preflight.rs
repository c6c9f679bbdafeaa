use anyhow::{anyhow, Result};
use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const YJIT_ENABLED_PROBE: &str = "exit((defined?(RubyVM::YJIT) && RubyVM::YJIT.enabled?) ? 0 : 1)";
const YJIT_STATS_PROBE: &str = "exit(RubyVM::YJIT.runtime_stats.is_a?(Hash) ? 0 : 1)";

fn probe(ruby: &str, args: &[&str]) -> Result<Output> {
    Command::new(ruby)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| anyhow!("failed to run {}: {}", ruby, e))
}

/// `ruby -v` output, stamped at the top of every failure report.
pub fn runtime_version(ruby: &str) -> Result<String> {
    let out = probe(ruby, &["-v"])?;
    if !out.status.success() {
        return Err(anyhow!(
            "{} -v exited with {}: {}",
            ruby,
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

pub fn check_jit_available(ruby: &str) -> Result<()> {
    let out = probe(ruby, &["--yjit", "-e", YJIT_ENABLED_PROBE])?;
    if !out.status.success() {
        return Err(anyhow!(
            "{} was not built with YJIT; rebuild with YJIT or pass --no-yjit",
            ruby
        ));
    }
    Ok(())
}

pub fn check_jit_stats_available(ruby: &str) -> Result<()> {
    let out = probe(ruby, &["--yjit-stats", "-e", YJIT_STATS_PROBE])?;
    if !out.status.success() {
        return Err(anyhow!(
            "{} does not expose YJIT stats; burn-in samples --yjit-stats and needs them",
            ruby
        ));
    }
    Ok(())
}

/// Clears out reports from a previous burn-in and recreates the directory.
pub fn prepare_logs_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .map_err(|e| anyhow!("failed to clear logs dir {}: {}", path.display(), e))?;
    }
    fs::create_dir_all(path)
        .map_err(|e| anyhow!("failed to create logs dir {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn prepare_logs_dir_starts_empty() {
        let dir = std::env::temp_dir().join(format!(
            "burnin_prepare_{}_{}",
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join("error_fib_001.txt"), "stale").expect("stale report");

        prepare_logs_dir(&dir).expect("prepare");
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).expect("read").count(), 0);

        fs::remove_dir_all(&dir).expect("cleanup");
        prepare_logs_dir(&dir).expect("prepare fresh");
        assert!(dir.is_dir());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_interpreter_fails_preflight() {
        let ruby = "/nonexistent/burnin/ruby";
        assert!(runtime_version(ruby).is_err());
        assert!(check_jit_available(ruby).is_err());
        assert!(check_jit_stats_available(ruby).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn probe_exit_status_decides_availability() {
        assert!(check_jit_available("true").is_ok());
        let err = check_jit_available("false").expect_err("false must fail");
        assert!(err.to_string().contains("--no-yjit"));
        assert!(check_jit_stats_available("false").is_err());
        assert!(runtime_version("false").is_err());
    }
}
