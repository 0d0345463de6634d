//! Multi-stream feasibility optimization under a utilization ceiling.
//!
//! The reduction is a single proportional scale-down of every reservation,
//! floored at each stream's unmargined requirement. Streams that cannot
//! keep their minimum under the ceiling are flagged instead of silently
//! under-provisioned; their siblings still receive valid parameters.

use tracing::{debug, warn};

use super::CbsParameters;
use super::derive::derive_parameters;
use crate::config::LinkConfig;
use crate::stream::StreamRequirement;
use crate::Result;

/// Tolerance for the ceiling re-check after scaling.
const UTILIZATION_EPSILON: f64 = 1e-9;

/// Per-stream result of a feasibility pass.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The stream fits under the ceiling with these parameters.
    Feasible(CbsParameters),
    /// The proportional cut would drop the reservation below the stream's
    /// unmargined requirement.
    InfeasibleUnderTarget {
        /// Minimum reservation the stream needs, bits per second
        required_bps: f64,
        /// Reservation the proportional cut would have granted
        granted_bps: f64,
    },
    /// The stream's requirement was invalid on its own; siblings were
    /// still processed.
    Rejected { reason: String },
}

impl StreamOutcome {
    /// Returns the parameters when the stream is feasible.
    pub fn parameters(&self) -> Option<&CbsParameters> {
        match self {
            StreamOutcome::Feasible(params) => Some(params),
            _ => None,
        }
    }
}

/// Outcome of optimizing a set of streams against one link.
#[derive(Debug, Clone)]
pub struct FeasibilityReport {
    /// Per-stream outcomes in deterministic processing order
    /// (ascending priority, then lexicographic name).
    pub outcomes: Vec<(String, StreamOutcome)>,
    /// Link rate the report was computed for, bits per second
    pub link_rate_bps: f64,
    /// Utilization ceiling the optimizer enforced
    pub target_utilization: f64,
    /// Whether the proportional cut was applied at all
    pub scaled: bool,
}

impl FeasibilityReport {
    /// Parameters of all feasible streams, in processing order.
    pub fn feasible_parameters(&self) -> Vec<&CbsParameters> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.parameters())
            .collect()
    }

    /// Sum of feasible idle slopes, bits per second.
    pub fn aggregate_idle_slope_bps(&self) -> f64 {
        self.feasible_parameters()
            .iter()
            .map(|p| p.idle_slope_bps)
            .sum()
    }

    /// Aggregate utilization of the feasible streams.
    pub fn utilization(&self) -> f64 {
        self.aggregate_idle_slope_bps() / self.link_rate_bps
    }

    /// Checks whether any stream missed its minimum guarantee.
    pub fn has_infeasible(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, o)| matches!(o, StreamOutcome::InfeasibleUnderTarget { .. }))
    }

    /// Checks whether any stream was rejected outright.
    pub fn has_rejected(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, o)| matches!(o, StreamOutcome::Rejected { .. }))
    }

    /// Looks up the outcome for a stream by name.
    pub fn outcome(&self, stream: &str) -> Option<&StreamOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == stream)
            .map(|(_, outcome)| outcome)
    }
}

/// Scales stream reservations so the aggregate stays under the configured
/// utilization ceiling.
///
/// Streams are processed in ascending priority then name order, making the
/// outcome independent of input ordering. The reduction is linear and
/// converges in one pass; a second pass only re-validates the ceiling.
///
/// # Errors
///
/// - `CoreError::InvalidLinkRate` / `CoreError::InvalidConfiguration` - If
///   the link configuration itself is malformed. Per-stream failures never
///   abort the batch; they surface as [`StreamOutcome::Rejected`].
pub fn optimize_streams(
    streams: &[StreamRequirement],
    config: &LinkConfig,
) -> Result<FeasibilityReport> {
    config.validate()?;

    // Deterministic processing order: lowest priority first, names break ties
    let mut ordered: Vec<&StreamRequirement> = streams.iter().collect();
    ordered.sort_by(|a, b| {
        a.priority()
            .cmp(&b.priority())
            .then_with(|| a.name().cmp(b.name()))
    });

    let derived: Vec<(&StreamRequirement, Result<CbsParameters>)> = ordered
        .into_iter()
        .map(|requirement| (requirement, derive_parameters(requirement, config)))
        .collect();

    let ceiling = config.target_utilization * config.link_rate_bps;
    let aggregate: f64 = derived
        .iter()
        .filter_map(|(_, result)| result.as_ref().ok())
        .map(|p| p.idle_slope_bps)
        .sum();

    let scaled = aggregate > ceiling;
    let scale = if scaled { ceiling / aggregate } else { 1.0 };
    if scaled {
        debug!(aggregate, ceiling, scale, "scaling reservations to ceiling");
    }

    let outcomes: Vec<(String, StreamOutcome)> = derived
        .into_iter()
        .map(|(requirement, result)| {
            let name = requirement.name().to_string();
            let outcome = match result {
                Err(error) => StreamOutcome::Rejected {
                    reason: error.to_string(),
                },
                Ok(params) if !scaled => StreamOutcome::Feasible(params),
                Ok(mut params) => {
                    let reduced = params.idle_slope_bps * scale;
                    if reduced < requirement.bitrate_bps() {
                        StreamOutcome::InfeasibleUnderTarget {
                            required_bps: requirement.bitrate_bps(),
                            granted_bps: reduced,
                        }
                    } else {
                        rescale(&mut params, reduced, requirement.bitrate_bps(), config);
                        StreamOutcome::Feasible(params)
                    }
                }
            };
            (name, outcome)
        })
        .collect();

    let report = FeasibilityReport {
        outcomes,
        link_rate_bps: config.link_rate_bps,
        target_utilization: config.target_utilization,
        scaled,
    };

    // Second pass: the reduction is linear, so this only re-validates.
    if report.aggregate_idle_slope_bps() > ceiling + UTILIZATION_EPSILON {
        warn!(
            aggregate = report.aggregate_idle_slope_bps(),
            ceiling, "aggregate still above ceiling after scaling"
        );
    }

    Ok(report)
}

/// Rebuilds slope-derived fields after reducing the idle slope.
fn rescale(params: &mut CbsParameters, idle_slope: f64, bitrate_bps: f64, config: &LinkConfig) {
    let link_rate = config.link_rate_bps;
    let max_frame_bits = f64::from(params.max_frame_size) * 8.0;

    params.idle_slope_bps = idle_slope;
    params.send_slope_bps = idle_slope - link_rate;
    params.hi_credit_bits = max_frame_bits * idle_slope / link_rate;
    params.lo_credit_bits = max_frame_bits * params.send_slope_bps / link_rate;
    params.reserved_bandwidth_bps = idle_slope;
    params.efficiency = bitrate_bps / idle_slope;
}
