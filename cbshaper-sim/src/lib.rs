//! Cbshaper Simulation - Discrete-event Credit-Based Shaper replay
//!
//! This crate replays frame-arrival sequences against derived CBS
//! parameters and reduces the per-frame transmission schedule into
//! latency, jitter and loss statistics. Each queue's event loop is
//! strictly sequential; independent queues can run in parallel.

pub mod credit;
pub mod profile;
pub mod report;
pub mod simulator;
pub mod stats;

// Re-export main types for convenient access
pub use credit::{CreditPolicy, CreditState, QueueMode};
pub use profile::TrafficProfile;
pub use report::SimulationReport;
pub use simulator::{
    CreditSimulator, Frame, FrameRecord, QueueSetup, SimulationResult, simulate_queues,
};
pub use stats::{SimulationSummary, SummaryStats, summarize};

/// Errors that can occur when setting up or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// CBS parameters that cannot drive a valid credit state machine.
    /// Checked once before the event loop starts.
    #[error("Invalid CBS parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("Invalid traffic profile: {reason}")]
    InvalidProfile { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
