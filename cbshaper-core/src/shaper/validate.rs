//! Advisory validation of derived CBS configurations.
//!
//! Validation never fails: over-subscription can be a deliberate design
//! choice, so problems are reported as ordered warnings rather than errors.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CbsParameters;
use super::derive::theoretical_delay;
use crate::config::LinkConfig;
use crate::stream::StreamRequirement;

/// Aggregate utilization above this fraction is flagged as high.
const HIGH_UTILIZATION: f64 = 0.80;

/// Aggregate utilization above this fraction is flagged as critical.
const CRITICAL_UTILIZATION: f64 = 0.95;

/// A single stream reserving more than this fraction is flagged.
const DOMINANT_STREAM_SHARE: f64 = 0.50;

/// Credit magnitudes beyond this multiple of the max frame size
/// usually indicate a mis-tuned configuration.
const CREDIT_FRAME_RATIO_LIMIT: f64 = 8.0;

/// Reservations below this efficiency waste noticeable bandwidth.
const LOW_EFFICIENCY: f64 = 0.50;

/// Non-fatal findings about a derived configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigWarning {
    /// Aggregate reservation above the recommended ceiling
    HighUtilization { utilization: f64 },
    /// Aggregate reservation close to link capacity
    CriticalUtilization { utilization: f64 },
    /// One stream reserves a dominant share of the link
    DominantStream { stream: String, share: f64 },
    /// Credit bounds much larger than one frame, likely mis-tuned
    OversizedCredit { stream: String, frame_ratio: f64 },
    /// Large gap between requirement and reservation
    LowEfficiency { stream: String, efficiency: f64 },
    /// Predicted delay leaves little margin to the stream's bound
    LatencyAtRisk {
        stream: String,
        predicted_ms: f64,
        bound_ms: f64,
    },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::HighUtilization { utilization } => {
                write!(f, "high link utilization: {:.1}%", utilization * 100.0)
            }
            ConfigWarning::CriticalUtilization { utilization } => {
                write!(f, "critical link utilization: {:.1}%", utilization * 100.0)
            }
            ConfigWarning::DominantStream { stream, share } => {
                write!(
                    f,
                    "{stream}: reserves {:.1}% of the link rate",
                    share * 100.0
                )
            }
            ConfigWarning::OversizedCredit {
                stream,
                frame_ratio,
            } => {
                write!(
                    f,
                    "{stream}: credit bounds span {frame_ratio:.1}x the max frame size"
                )
            }
            ConfigWarning::LowEfficiency { stream, efficiency } => {
                write!(f, "{stream}: efficiency {:.1}%", efficiency * 100.0)
            }
            ConfigWarning::LatencyAtRisk {
                stream,
                predicted_ms,
                bound_ms,
            } => {
                write!(
                    f,
                    "{stream}: predicted delay {predicted_ms:.3} ms close to bound {bound_ms:.3} ms"
                )
            }
        }
    }
}

/// Checks a derived parameter set for consistency and near-capacity risk.
///
/// Returns an empty list when no issues are found. Aggregate warnings come
/// first, then per-stream warnings in input order.
pub fn validate_parameters(params: &[CbsParameters], config: &LinkConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let link_rate = config.link_rate_bps;

    let aggregate: f64 = params.iter().map(|p| p.idle_slope_bps).sum();
    let utilization = aggregate / link_rate;
    if utilization > CRITICAL_UTILIZATION {
        warnings.push(ConfigWarning::CriticalUtilization { utilization });
    } else if utilization > HIGH_UTILIZATION {
        warnings.push(ConfigWarning::HighUtilization { utilization });
    }

    for param in params {
        let share = param.utilization(link_rate);
        if share > DOMINANT_STREAM_SHARE {
            warnings.push(ConfigWarning::DominantStream {
                stream: param.stream.clone(),
                share,
            });
        }

        let max_frame_bits = f64::from(param.max_frame_size) * 8.0;
        let frame_ratio =
            param.hi_credit_bits.max(param.lo_credit_bits.abs()) / max_frame_bits;
        if frame_ratio > CREDIT_FRAME_RATIO_LIMIT {
            warnings.push(ConfigWarning::OversizedCredit {
                stream: param.stream.clone(),
                frame_ratio,
            });
        }

        if param.efficiency < LOW_EFFICIENCY {
            warnings.push(ConfigWarning::LowEfficiency {
                stream: param.stream.clone(),
                efficiency: param.efficiency,
            });
        }
    }

    warnings
}

/// Like [`validate_parameters`], additionally checking predicted delays
/// against each stream's latency bound.
///
/// Streams are matched to parameters by name; requirements without a
/// matching parameter set are skipped.
pub fn validate_with_requirements(
    params: &[CbsParameters],
    requirements: &[StreamRequirement],
    config: &LinkConfig,
) -> Vec<ConfigWarning> {
    let mut warnings = validate_parameters(params, config);

    for requirement in requirements {
        let Some(param) = params.iter().find(|p| p.stream == requirement.name()) else {
            continue;
        };

        let predicted_ms = theoretical_delay(param, config.link_rate_bps).total_ms();
        // 80% of the bound leaves margin for multi-hop and measurement error
        if predicted_ms > requirement.max_latency_ms() * 0.8 {
            warnings.push(ConfigWarning::LatencyAtRisk {
                stream: requirement.name().to_string(),
                predicted_ms,
                bound_ms: requirement.max_latency_ms(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaper::derive::derive_parameters;
    use crate::stream::TrafficType;

    fn derive(name: &str, bitrate_mbps: f64) -> CbsParameters {
        let requirement = StreamRequirement::builder(name)
            .traffic_type(TrafficType::Video1080p)
            .bitrate_mbps(bitrate_mbps)
            .priority(5)
            .max_latency_ms(30.0)
            .max_jitter_ms(5.0)
            .build()
            .unwrap();
        derive_parameters(&requirement, &LinkConfig::default()).unwrap()
    }

    #[test]
    fn test_clean_configuration_has_no_warnings() {
        let params = vec![derive("cam_a", 25.0), derive("cam_b", 25.0)];
        let warnings = validate_parameters(&params, &LinkConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_high_utilization_flagged() {
        // 3 x 240 Mbps at 1.2x headroom = 864 Mbps reserved
        let params = vec![
            derive("a", 240.0),
            derive("b", 240.0),
            derive("c", 240.0),
        ];
        let warnings = validate_parameters(&params, &LinkConfig::default());

        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::HighUtilization { .. })));
    }

    #[test]
    fn test_critical_utilization_supersedes_high() {
        let params = vec![
            derive("a", 270.0),
            derive("b", 270.0),
            derive("c", 270.0),
        ];
        let warnings = validate_parameters(&params, &LinkConfig::default());

        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::CriticalUtilization { .. })));
        assert!(!warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::HighUtilization { .. })));
    }

    #[test]
    fn test_dominant_stream_flagged() {
        let params = vec![derive("firehose", 600.0)];
        let warnings = validate_parameters(&params, &LinkConfig::default());

        assert!(warnings.iter().any(|w| matches!(
            w,
            ConfigWarning::DominantStream { stream, .. } if stream == "firehose"
        )));
    }

    #[test]
    fn test_low_efficiency_flagged() {
        let mut param = derive("padded", 10.0);
        // Simulate a manually over-provisioned reservation
        param.efficiency = 0.4;
        let warnings = validate_parameters(&[param], &LinkConfig::default());

        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::LowEfficiency { .. })));
    }

    #[test]
    fn test_oversized_credit_flagged() {
        let mut param = derive("mistuned", 25.0);
        param.hi_credit_bits = f64::from(param.max_frame_size) * 8.0 * 20.0;
        let warnings = validate_parameters(&[param], &LinkConfig::default());

        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::OversizedCredit { .. })));
    }

    #[test]
    fn test_latency_at_risk_flagged() {
        let requirement = StreamRequirement::builder("tight")
            .traffic_type(TrafficType::Control)
            .bitrate_mbps(1.0)
            .priority(7)
            .max_latency_ms(0.02) // 20 us bound, unreachable at 1.2 Mbps
            .max_jitter_ms(0.5)
            .build()
            .unwrap();
        let config = LinkConfig::default();
        let params = vec![derive_parameters(&requirement, &config).unwrap()];

        let warnings = validate_with_requirements(&params, &[requirement], &config);
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::LatencyAtRisk { .. })));
    }
}
