//! Result types returned by a successful workflow run.

use crate::api::{ProcessResult, Step, Tool};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a caller may want to report after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutput {
    /// Input file name, as given.
    pub file_name: String,
    pub tool: Tool,
    /// Task id allocated by the start call.
    pub task: String,
    /// Backend node the task was pinned to.
    pub server: String,
    /// Service response to the process call.
    pub process: ProcessResult,
    /// Where the result was written.
    pub output_path: PathBuf,
    pub bytes_written: u64,
    pub stats: WorkflowStats,
}

/// Wall-clock timings of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub total_duration_ms: u64,
    /// One entry per completed step, in execution order.
    pub steps: Vec<StepTiming>,
}

impl WorkflowStats {
    pub fn duration_of(&self, step: Step) -> Option<u64> {
        self.steps
            .iter()
            .find(|t| t.step == step)
            .map(|t| t.duration_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTiming {
    pub step: Step,
    pub duration_ms: u64,
}
