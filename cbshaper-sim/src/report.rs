//! JSON simulation reports for downstream analysis tooling.

use cbshaper_core::CbsParameters;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::simulator::{FrameRecord, SimulationResult};
use crate::stats::{SimulationSummary, summarize};

/// Ordered per-frame records plus the aggregate summary for one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Stream the queue was shaped for
    pub stream: String,
    /// Parameters the queue ran with
    pub parameters: CbsParameters,
    pub generated_at: String,
    pub duration_s: f64,
    /// Per-frame outcomes in arrival order
    pub frames: Vec<FrameRecord>,
    pub summary: SimulationSummary,
}

impl SimulationReport {
    /// Builds a report from a finished run.
    pub fn new(parameters: CbsParameters, result: SimulationResult) -> Self {
        let summary = summarize(&result);
        Self {
            stream: parameters.stream.clone(),
            parameters,
            generated_at: chrono::Utc::now().to_rfc3339(),
            duration_s: result.duration_s,
            frames: result.records,
            summary,
        }
    }

    /// Serializes the report to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Json` - If serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a report from JSON.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Json` - If the input is not a valid report
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }
}
