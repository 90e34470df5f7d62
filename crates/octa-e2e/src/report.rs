//! Summary of a run and the process exit code derived from it

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::runner::{TestOutcome, TestStatus};

/// Aggregated outcomes of a run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Tests that passed
    pub passed: usize,
    /// Tests that failed
    pub failed: usize,
    /// Tests that errored
    pub errored: usize,
    /// Tests cancelled by the run timeout
    pub cancelled: usize,
    /// Time spent in test bodies
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// Per-test outcomes, in execution order
    pub outcomes: Vec<TestOutcome>,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl Report {
    /// Aggregate a run
    pub fn from_outcomes(outcomes: &[TestOutcome]) -> Self {
        let count = |status: TestStatus| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            errored: count(TestStatus::Errored),
            cancelled: count(TestStatus::Cancelled),
            duration: outcomes.iter().map(|o| o.duration).sum(),
            outcomes: outcomes.to_vec(),
        }
    }

    /// Number of tests
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether every test passed
    ///
    /// An empty run counts as success.
    pub fn all_passed(&self) -> bool {
        self.passed == self.total()
    }

    /// Process exit code: 0 if every test passed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    /// Human-readable report
    pub fn render<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let width = self
            .outcomes
            .iter()
            .map(|o| o.name.len())
            .max()
            .unwrap_or(0);

        for outcome in &self.outcomes {
            writeln!(
                out,
                "{:<9} {:<width$}  ({:.2}s)",
                outcome.status.label(),
                outcome.name,
                outcome.duration.as_secs_f64(),
                width = width
            )?;
            if let Some(message) = &outcome.message {
                for line in message.lines() {
                    writeln!(out, "          {}", line)?;
                }
            }
            if let Some(output) = &outcome.output {
                for line in output.lines() {
                    writeln!(out, "          | {}", line)?;
                }
            }
        }

        writeln!(
            out,
            "\n{} passed, {} failed, {} errored, {} cancelled ({} total, {:.2}s)",
            self.passed,
            self.failed,
            self.errored,
            self.cancelled,
            self.total(),
            self.duration.as_secs_f64()
        )
    }

    /// Render to `out`, write the JSON report if `json_path` is given, and
    /// return the exit code
    ///
    /// Failing to write either output is logged; the exit code still reflects
    /// the test outcomes alone.
    pub fn publish<W: Write>(&self, out: &mut W, json_path: Option<&Path>) -> i32 {
        if let Err(e) = self.render(out) {
            tracing::error!(error = %e, "failed to render report");
        }
        if let Some(path) = json_path {
            match self.write_json(path) {
                Ok(()) => tracing::info!(path = %path.display(), "report written"),
                Err(e) => tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "failed to write JSON report"
                ),
            }
        }
        self.exit_code()
    }

    /// Write the report as JSON
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}
