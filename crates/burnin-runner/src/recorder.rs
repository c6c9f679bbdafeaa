use crate::error::HarnessError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub runtime_version: String,
    pub pid: u32,
    pub command: String,
    pub output: String,
}

impl FailureReport {
    pub fn render(&self) -> String {
        format!(
            "{}\n\npid {}\n{}\n\n{}",
            self.runtime_version, self.pid, self.command, self.output
        )
    }
}

pub fn report_file_name(benchmark: &str, seq: u32) -> String {
    format!("error_{}_{:03}.txt", benchmark, seq)
}

/// Writes `report` to the first free `error_<benchmark>_<seq>.txt` in
/// `logs_dir`. Names are claimed with `create_new`, so workers racing on the
/// same benchmark each get their own file.
pub fn record(
    logs_dir: &Path,
    benchmark: &str,
    report: &FailureReport,
) -> Result<PathBuf, HarnessError> {
    let mut seq: u32 = 1;
    loop {
        let path = logs_dir.join(report_file_name(benchmark, seq));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(report.render().as_bytes())
                    .and_then(|_| file.sync_all())
                    .map_err(|source| HarnessError::Report {
                        path: path.clone(),
                        source,
                    })?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => seq += 1,
            Err(source) => return Err(HarnessError::Report { path, source }),
        }
    }
}
