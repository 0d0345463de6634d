//! Credit-Based Shaper parameter derivation and analysis.

pub mod derive;
pub mod optimize;
pub mod validate;

use serde::{Deserialize, Serialize};

pub use derive::{BurstCapacity, DelayAnalysis, burst_capacity, derive_parameters, theoretical_delay};
pub use optimize::{FeasibilityReport, StreamOutcome, optimize_streams};
pub use validate::{ConfigWarning, validate_parameters, validate_with_requirements};

use crate::stream::TrafficType;

/// Derived Credit-Based Shaper parameters for one traffic class queue.
///
/// Invariants maintained by derivation: `send_slope_bps + link_rate =
/// idle_slope_bps` exactly, `hi_credit_bits > 0`, `lo_credit_bits < 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CbsParameters {
    /// Owning stream identifier
    pub stream: String,
    /// Traffic category the parameters were derived for
    pub traffic_type: TrafficType,
    /// Traffic class priority, 0-7
    pub priority: u8,
    /// Credit accrual rate while not transmitting, bits per second
    pub idle_slope_bps: f64,
    /// Credit drain rate while transmitting, bits per second (negative)
    pub send_slope_bps: f64,
    /// Upper credit clamp, bits
    pub hi_credit_bits: f64,
    /// Lower credit clamp, bits (negative)
    pub lo_credit_bits: f64,
    /// Maximum frame size the credit bounds assume, bytes
    pub max_frame_size: u32,
    /// Bandwidth reserved on the link (equals the idle slope), bits per second
    pub reserved_bandwidth_bps: f64,
    /// Ratio of required bitrate to reservation, 0 < x <= 1
    pub efficiency: f64,
}

impl CbsParameters {
    /// Reserved bandwidth as a fraction of the given link rate.
    pub fn utilization(&self, link_rate_bps: f64) -> f64 {
        self.idle_slope_bps / link_rate_bps
    }
}
