use crate::error::HarnessError;
use crate::sampler::RunConfiguration;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone)]
pub struct RunResult {
    pub output: String,
    pub success: bool,
    pub pid: u32,
    pub command: String,
}

/// Runs one benchmark under one configuration. A benchmark exiting non-zero
/// is reported through `RunResult::success`; only harness problems are errors.
pub trait Executor {
    fn execute(
        &self,
        benchmark: &str,
        config: &RunConfiguration,
        run_time_secs: u64,
        jit_disabled: bool,
    ) -> Result<RunResult, HarnessError>;
}

/// Fully resolved process invocation. `display` renders it for humans and is
/// never fed back into a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub env: BTreeMap<String, String>,
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("export {}={}", k, shell_quote(v)))
            .collect();
        let mut argv = vec![self.program.clone()];
        argv.extend(self.args.iter().cloned());
        parts.push(shell_join(&argv));
        parts.join(" && ")
    }
}

#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    pub ruby: String,
    pub benchmarks_dir: PathBuf,
    pub harness_dir: PathBuf,
}

impl ProcessExecutor {
    pub fn new(ruby: impl Into<String>, benchmarks_dir: &Path, harness_dir: &Path) -> Self {
        Self {
            ruby: ruby.into(),
            benchmarks_dir: benchmarks_dir.to_path_buf(),
            harness_dir: harness_dir.to_path_buf(),
        }
    }

    pub fn resolve_script(&self, benchmark: &str) -> Result<PathBuf, HarnessError> {
        let tried = vec![
            self.benchmarks_dir.join(benchmark).join("benchmark.rb"),
            self.benchmarks_dir.join(format!("{}.rb", benchmark)),
        ];
        if let Some(found) = tried.iter().find(|p| p.is_file()) {
            return Ok(found.clone());
        }
        Err(HarnessError::ScriptNotFound {
            benchmark: benchmark.to_string(),
            tried,
        })
    }

    pub fn build_invocation(
        &self,
        benchmark: &str,
        config: &RunConfiguration,
        run_time_secs: u64,
        jit_disabled: bool,
    ) -> Result<Invocation, HarnessError> {
        let script = self.resolve_script(benchmark)?;

        let mut env = BTreeMap::new();
        env.insert("WARMUP_ITRS".to_string(), "0".to_string());
        env.insert("MIN_BENCH_TIME".to_string(), run_time_secs.to_string());
        for (k, v) in &config.env_overrides {
            env.insert(k.clone(), v.clone());
        }

        let mut args = Vec::new();
        if !jit_disabled {
            args.extend(config.extra_flags.iter().cloned());
        }
        args.push(format!("-I{}", self.harness_dir.display()));
        args.push(script.to_string_lossy().to_string());

        Ok(Invocation {
            env,
            program: self.ruby.clone(),
            args,
        })
    }
}

impl Executor for ProcessExecutor {
    fn execute(
        &self,
        benchmark: &str,
        config: &RunConfiguration,
        run_time_secs: u64,
        jit_disabled: bool,
    ) -> Result<RunResult, HarnessError> {
        let invocation = self.build_invocation(benchmark, config, run_time_secs, jit_disabled)?;
        let pid = std::process::id();
        let command = invocation.display();
        println!("pid {}", pid);
        println!("{}", command);

        let (output, success) = run_merged(&invocation)?;
        Ok(RunResult {
            output,
            success,
            pid,
            command,
        })
    }
}

/// Runs the invocation with stdout and stderr sharing one anonymous file so
/// the captured text keeps the child's interleaving.
fn run_merged(invocation: &Invocation) -> Result<(String, bool), HarnessError> {
    let mut capture = tempfile::tempfile().map_err(HarnessError::Capture)?;
    let stdout = capture.try_clone().map_err(HarnessError::Capture)?;
    let stderr = capture.try_clone().map_err(HarnessError::Capture)?;

    let status = Command::new(&invocation.program)
        .args(&invocation.args)
        .envs(&invocation.env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .status()
        .map_err(|source| HarnessError::Launch {
            program: invocation.program.clone(),
            source,
        })?;

    let mut bytes = Vec::new();
    capture
        .seek(SeekFrom::Start(0))
        .and_then(|_| capture.read_to_end(&mut bytes))
        .map_err(HarnessError::Capture)?;
    Ok((String::from_utf8_lossy(&bytes).to_string(), status.success()))
}

fn shell_join(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| shell_quote(p))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "burnin_exec_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    fn jit_config() -> RunConfiguration {
        RunConfiguration {
            env_overrides: BTreeMap::from([
                ("RUBY_GC_AUTO_COMPACT".to_string(), "1".to_string()),
                ("WARMUP_ITRS".to_string(), "5".to_string()),
            ]),
            extra_flags: vec![
                "--yjit-call-threshold=2".to_string(),
                "--yjit-stats".to_string(),
            ],
        }
    }

    #[test]
    fn subdirectory_layout_wins_over_flat_file() {
        let root = scratch_dir("layout");
        fs::create_dir_all(root.join("both")).expect("bench dir");
        fs::write(root.join("both").join("benchmark.rb"), "").expect("nested");
        fs::write(root.join("both.rb"), "").expect("flat");
        fs::write(root.join("flat.rb"), "").expect("flat only");

        let exec = ProcessExecutor::new("ruby", &root, Path::new("harness"));
        assert_eq!(
            exec.resolve_script("both").expect("both"),
            root.join("both").join("benchmark.rb")
        );
        assert_eq!(exec.resolve_script("flat").expect("flat"), root.join("flat.rb"));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_script_is_a_harness_error() {
        let root = scratch_dir("missing");
        let exec = ProcessExecutor::new("ruby", &root, Path::new("harness"));
        let err = exec
            .execute("nope", &jit_config(), 10, false)
            .expect_err("missing script must fail");
        match err {
            HarnessError::ScriptNotFound { benchmark, tried } => {
                assert_eq!(benchmark, "nope");
                assert_eq!(tried.len(), 2);
            }
            other => panic!("unexpected error: {}", other),
        }
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn invocation_layers_overrides_and_orders_args() {
        let root = scratch_dir("invocation");
        fs::write(root.join("fib.rb"), "").expect("script");
        let exec = ProcessExecutor::new("ruby", &root, Path::new("harness"));

        let inv = exec
            .build_invocation("fib", &jit_config(), 10, false)
            .expect("invocation");
        assert_eq!(inv.env.get("WARMUP_ITRS").map(String::as_str), Some("5"));
        assert_eq!(inv.env.get("MIN_BENCH_TIME").map(String::as_str), Some("10"));
        assert_eq!(inv.program, "ruby");
        assert_eq!(
            inv.args,
            vec![
                "--yjit-call-threshold=2".to_string(),
                "--yjit-stats".to_string(),
                "-Iharness".to_string(),
                root.join("fib.rb").to_string_lossy().to_string(),
            ]
        );

        let interp = exec
            .build_invocation("fib", &jit_config(), 10, true)
            .expect("invocation");
        assert_eq!(interp.args.len(), 2);
        assert_eq!(interp.args[0], "-Iharness");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn display_renders_exports_then_quoted_argv() {
        let inv = Invocation {
            env: BTreeMap::from([
                ("MIN_BENCH_TIME".to_string(), "10".to_string()),
                ("NOTE".to_string(), "two words".to_string()),
            ]),
            program: "ruby".to_string(),
            args: vec!["--yjit-log=/dev/null".to_string(), "it's.rb".to_string()],
        };
        assert_eq!(
            inv.display(),
            "export MIN_BENCH_TIME=10 && export NOTE='two words' && ruby --yjit-log=/dev/null 'it'\"'\"'s.rb'"
        );
    }

    #[test]
    fn missing_interpreter_is_a_launch_error() {
        let root = scratch_dir("launch");
        fs::write(root.join("fib.rb"), "").expect("script");
        let exec = ProcessExecutor::new(
            root.join("no-such-ruby").to_string_lossy().to_string(),
            &root,
            Path::new("harness"),
        );
        let err = exec
            .execute("fib", &RunConfiguration::default(), 10, true)
            .expect_err("launch must fail");
        assert!(matches!(err, HarnessError::Launch { .. }), "got {}", err);
        let _ = fs::remove_dir_all(root);
    }

    #[cfg(unix)]
    #[test]
    fn captures_merged_output_and_failure_status() {
        use std::os::unix::fs::PermissionsExt;

        let root = scratch_dir("merged");
        fs::write(root.join("fib.rb"), "").expect("script");
        let fake_ruby = root.join("fake-ruby");
        fs::write(
            &fake_ruby,
            "#!/bin/sh\necho \"budget=$MIN_BENCH_TIME warmup=$WARMUP_ITRS\"\necho \"boom\" >&2\nexit 3\n",
        )
        .expect("fake ruby");
        fs::set_permissions(&fake_ruby, fs::Permissions::from_mode(0o755)).expect("chmod");

        let exec = ProcessExecutor::new(
            fake_ruby.to_string_lossy().to_string(),
            &root,
            Path::new("harness"),
        );
        let result = exec
            .execute("fib", &RunConfiguration::default(), 42, true)
            .expect("harness ok");
        assert!(!result.success);
        assert_eq!(result.pid, std::process::id());
        assert!(result.output.contains("budget=42 warmup=0"), "{}", result.output);
        assert!(result.output.contains("boom"), "{}", result.output);
        assert!(result.command.contains("export MIN_BENCH_TIME=42"));
        let _ = fs::remove_dir_all(root);
    }
}
