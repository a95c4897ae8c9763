//! JSON exporter for scenario runs.
//!
//! Exports per-step summaries and the final link ledger so a run can be
//! inspected (or diffed against another seed) offline.

use chrono::{DateTime, Utc};
use seawatch_core::{CorrelationStats, LinkRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;
use crate::runner::ScenarioResult;

/// Engine state after a single scenario step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFrame {
    pub step: u64,

    /// Simulated wall-clock time
    pub time: DateTime<Utc>,

    /// What the step did, e.g. `register_point P-00012`
    pub action: String,

    pub missions: usize,
    pub points: usize,
    pub bound_pairs: usize,
    pub ledger_size: usize,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// All frames
    pub frames: Vec<StepFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    pub stats: CorrelationStats,

    /// Link records at the end of the run, ordered by mission then point
    pub ledger: Vec<LinkRecord>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
            stats: CorrelationStats::default(),
            ledger: Vec::new(),
        }
    }

    /// Builds an export from a finished run.
    pub fn from_result(result: &ScenarioResult) -> Self {
        let mut export = Self::new(result.scenario.name(), result.seed);
        for frame in &result.frames {
            export.add_frame(frame.clone());
        }
        export.stats = result.metrics.stats.clone();
        export.ledger = result.ledger.clone();
        export.finalize(result.passed, result.failure_reason.clone());
        export
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: StepFrame) {
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
