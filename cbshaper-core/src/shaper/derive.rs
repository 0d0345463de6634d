//! Closed-form derivation of CBS parameters from stream requirements.

use tracing::debug;

use super::CbsParameters;
use crate::config::LinkConfig;
use crate::stream::StreamRequirement;
use crate::{CoreError, Result};

/// Switch-internal processing delay assumed by the delay model, seconds.
const PROCESSING_DELAY_S: f64 = 10e-6;

/// Propagation delay for short in-vehicle links, seconds.
const PROPAGATION_DELAY_S: f64 = 1e-6;

/// Derives CBS parameters for one stream on the configured link.
///
/// Pure function: identical inputs always produce identical parameters.
/// The headroom multiplier comes from `config.burst_tolerance` when set,
/// otherwise from the stream's traffic-type defaults; the same rule applies
/// to the maximum frame size.
///
/// # Errors
///
/// - `CoreError::InvalidLinkRate` - If the link configuration is malformed
/// - `CoreError::InvalidRequirement` - If the required bitrate does not fit
///   the link (the bitrate must be strictly below the link rate so the send
///   slope stays negative)
pub fn derive_parameters(
    requirement: &StreamRequirement,
    config: &LinkConfig,
) -> Result<CbsParameters> {
    config.validate()?;

    let link_rate = config.link_rate_bps;
    let bitrate = requirement.bitrate_bps();

    if bitrate >= link_rate {
        return Err(CoreError::InvalidRequirement {
            name: requirement.name().to_string(),
            reason: format!(
                "bitrate {bitrate} bps must be strictly below the link rate {link_rate} bps"
            ),
        });
    }

    let headroom = config
        .burst_tolerance
        .unwrap_or_else(|| requirement.traffic_type().default_headroom());
    let max_frame_size = config
        .max_frame_size
        .unwrap_or_else(|| requirement.traffic_type().default_max_frame_size());

    let idle_slope = bitrate * headroom;
    if idle_slope >= link_rate {
        return Err(CoreError::InvalidRequirement {
            name: requirement.name().to_string(),
            reason: format!(
                "reservation {idle_slope} bps (bitrate with {headroom}x headroom) \
                 exceeds the link rate {link_rate} bps"
            ),
        });
    }

    let send_slope = idle_slope - link_rate;
    let max_frame_bits = f64::from(max_frame_size) * 8.0;
    let hi_credit = max_frame_bits * idle_slope / link_rate;
    let lo_credit = max_frame_bits * send_slope / link_rate;
    let efficiency = bitrate / idle_slope;

    debug!(
        stream = requirement.name(),
        idle_slope, send_slope, hi_credit, lo_credit, "derived CBS parameters"
    );

    Ok(CbsParameters {
        stream: requirement.name().to_string(),
        traffic_type: requirement.traffic_type().clone(),
        priority: requirement.priority(),
        idle_slope_bps: idle_slope,
        send_slope_bps: send_slope,
        hi_credit_bits: hi_credit,
        lo_credit_bits: lo_credit,
        max_frame_size,
        reserved_bandwidth_bps: idle_slope,
        efficiency,
    })
}

/// Breakdown of the worst-case delay a shaped frame can experience.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayAnalysis {
    /// Time to serialize one maximum-size frame onto the link, seconds
    pub transmission_delay_s: f64,
    /// Worst-case wait for credit to recover from the lower clamp, seconds
    pub interference_delay_s: f64,
    /// Extra delay introduced by rate limiting below link speed, seconds
    pub shaping_delay_s: f64,
    /// Fixed switch processing delay, seconds
    pub processing_delay_s: f64,
    /// Link propagation delay, seconds
    pub propagation_delay_s: f64,
}

impl DelayAnalysis {
    /// Total predicted per-hop delay, seconds.
    pub fn total_s(&self) -> f64 {
        self.transmission_delay_s
            + self.interference_delay_s
            + self.shaping_delay_s
            + self.processing_delay_s
            + self.propagation_delay_s
    }

    /// Total predicted per-hop delay, milliseconds.
    pub fn total_ms(&self) -> f64 {
        self.total_s() * 1000.0
    }
}

/// Computes the theoretical delay bound for frames shaped by `params`.
///
/// The interference term models the time needed to climb back from the
/// lower credit clamp; the shaping term models the stretch-out of a
/// maximum-size frame at the reserved rate instead of link rate.
pub fn theoretical_delay(params: &CbsParameters, link_rate_bps: f64) -> DelayAnalysis {
    let max_frame_bits = f64::from(params.max_frame_size) * 8.0;

    DelayAnalysis {
        transmission_delay_s: max_frame_bits / link_rate_bps,
        interference_delay_s: params.lo_credit_bits.abs() / params.idle_slope_bps,
        shaping_delay_s: max_frame_bits * (link_rate_bps - params.idle_slope_bps)
            / (link_rate_bps * params.idle_slope_bps),
        processing_delay_s: PROCESSING_DELAY_S,
        propagation_delay_s: PROPAGATION_DELAY_S,
    }
}

/// Burst absorption capability implied by the credit bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstCapacity {
    /// Credit available for a burst, bits (the upper clamp)
    pub available_credit_bits: f64,
    /// Burst size the credit can cover, bytes
    pub capacity_bytes: f64,
    /// Time to rebuild the full credit from zero at the idle slope, seconds
    pub recovery_time_s: f64,
    /// Sustainable long-term rate, bits per second
    pub sustainable_rate_bps: f64,
}

/// Computes how much bursting the derived credit bounds allow.
pub fn burst_capacity(params: &CbsParameters) -> BurstCapacity {
    BurstCapacity {
        available_credit_bits: params.hi_credit_bits,
        capacity_bytes: params.hi_credit_bits / 8.0,
        recovery_time_s: params.hi_credit_bits / params.idle_slope_bps,
        sustainable_rate_bps: params.idle_slope_bps,
    }
}
