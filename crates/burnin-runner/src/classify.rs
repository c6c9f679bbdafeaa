use crate::executor::RunResult;

/// A failing run of `benchmark` whose output contains `marker` is noise from
/// concurrent workers sharing an external resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionRule {
    pub benchmark: String,
    pub marker: String,
}

impl SuppressionRule {
    pub fn new(benchmark: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            benchmark: benchmark.into(),
            marker: marker.into(),
        }
    }

    fn matches(&self, benchmark: &str, output: &str) -> bool {
        self.benchmark == benchmark && output.contains(&self.marker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Suppressed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct FailureClassifier {
    rules: Vec<SuppressionRule>,
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                // Several railsbench servers contend for the same port.
                SuppressionRule::new("railsbench", "HTTP status is"),
                // hexapdf writes its output to a fixed path shared by all workers.
                SuppressionRule::new("hexapdf", "incorrect size"),
            ],
        }
    }
}

impl FailureClassifier {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: SuppressionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[SuppressionRule] {
        &self.rules
    }

    pub fn verdict(&self, benchmark: &str, result: &RunResult) -> Verdict {
        if result.success {
            Verdict::Passed
        } else if self
            .rules
            .iter()
            .any(|r| r.matches(benchmark, &result.output))
        {
            Verdict::Suppressed
        } else {
            Verdict::Failed
        }
    }

    /// True when the run is a genuine failure worth recording.
    pub fn classify(&self, benchmark: &str, result: &RunResult) -> bool {
        self.verdict(benchmark, result) == Verdict::Failed
    }
}
