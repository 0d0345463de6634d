//! Stream requirements and traffic classification.
//!
//! A [`StreamRequirement`] is validated at construction and immutable
//! afterwards; all derivation code can therefore assume its fields are
//! in range.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Traffic categories seen on automotive Ethernet backbones.
///
/// The set of built-in categories is closed; site-specific traffic uses
/// [`TrafficType::Custom`] with an arbitrary tag rather than extending
/// the enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrafficType {
    SafetyCritical,
    Video4k,
    Video1080p,
    Video720p,
    Lidar,
    Radar,
    Control,
    V2x,
    Infotainment,
    Diagnostics,
    Ota,
    /// Extension point for traffic the built-in table does not cover.
    Custom { tag: String },
}

impl TrafficType {
    /// Default headroom multiplier applied to the required bitrate when
    /// no global burst tolerance is configured.
    pub fn default_headroom(&self) -> f64 {
        match self {
            TrafficType::SafetyCritical => 2.0,
            TrafficType::Video4k => 1.2,
            TrafficType::Video1080p => 1.25,
            TrafficType::Video720p => 1.3,
            TrafficType::Lidar => 1.15,
            TrafficType::Radar => 1.5,
            TrafficType::Control => 2.0,
            TrafficType::V2x => 1.4,
            TrafficType::Infotainment => 1.1,
            TrafficType::Diagnostics => 1.2,
            TrafficType::Ota => 1.05,
            TrafficType::Custom { .. } => 1.2,
        }
    }

    /// Default maximum frame size in bytes for this category.
    pub fn default_max_frame_size(&self) -> u32 {
        match self {
            TrafficType::SafetyCritical => 256,
            TrafficType::Video4k | TrafficType::Video1080p | TrafficType::Video720p => 1522,
            TrafficType::Lidar => 9000, // Jumbo frames
            TrafficType::Radar => 512,
            TrafficType::Control => 128,
            TrafficType::V2x => 1024,
            TrafficType::Infotainment | TrafficType::Diagnostics | TrafficType::Ota => 1522,
            TrafficType::Custom { .. } => 1522,
        }
    }

    /// Returns the wire tag used in configuration documents.
    pub fn tag(&self) -> &str {
        match self {
            TrafficType::SafetyCritical => "safety_critical",
            TrafficType::Video4k => "video_4k",
            TrafficType::Video1080p => "video_1080p",
            TrafficType::Video720p => "video_720p",
            TrafficType::Lidar => "lidar",
            TrafficType::Radar => "radar",
            TrafficType::Control => "control",
            TrafficType::V2x => "v2x",
            TrafficType::Infotainment => "infotainment",
            TrafficType::Diagnostics => "diagnostics",
            TrafficType::Ota => "ota",
            TrafficType::Custom { tag } => tag,
        }
    }
}

impl From<String> for TrafficType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "safety_critical" => TrafficType::SafetyCritical,
            "video_4k" => TrafficType::Video4k,
            "video_1080p" => TrafficType::Video1080p,
            "video_720p" => TrafficType::Video720p,
            "lidar" => TrafficType::Lidar,
            "radar" => TrafficType::Radar,
            "control" => TrafficType::Control,
            "v2x" => TrafficType::V2x,
            "infotainment" => TrafficType::Infotainment,
            "diagnostics" => TrafficType::Diagnostics,
            "ota" => TrafficType::Ota,
            _ => TrafficType::Custom { tag },
        }
    }
}

impl From<TrafficType> for String {
    fn from(traffic_type: TrafficType) -> Self {
        traffic_type.tag().to_string()
    }
}

impl fmt::Display for TrafficType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Bandwidth and timing requirement for one shaped stream.
///
/// Built through [`StreamRequirement::builder`], which rejects out-of-range
/// fields instead of deferring validation to derivation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequirement {
    name: String,
    traffic_type: TrafficType,
    bitrate_bps: f64,
    priority: u8,
    max_latency_ms: f64,
    max_jitter_ms: f64,
}

impl StreamRequirement {
    /// Starts building a requirement for the named stream.
    pub fn builder(name: impl Into<String>) -> StreamRequirementBuilder {
        StreamRequirementBuilder {
            name: name.into(),
            traffic_type: TrafficType::Custom {
                tag: "unclassified".to_string(),
            },
            bitrate_bps: 0.0,
            priority: 0,
            max_latency_ms: f64::INFINITY,
            max_jitter_ms: f64::INFINITY,
        }
    }

    /// Stream identifier, unique within one configuration pass.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Traffic category, used for per-type derivation defaults.
    pub fn traffic_type(&self) -> &TrafficType {
        &self.traffic_type
    }

    /// Required bitrate in bits per second, before headroom.
    pub fn bitrate_bps(&self) -> f64 {
        self.bitrate_bps
    }

    /// Traffic class priority, 0-7, higher is more urgent.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Maximum tolerable latency in milliseconds.
    pub fn max_latency_ms(&self) -> f64 {
        self.max_latency_ms
    }

    /// Maximum tolerable jitter in milliseconds.
    pub fn max_jitter_ms(&self) -> f64 {
        self.max_jitter_ms
    }
}

/// Validating builder for [`StreamRequirement`].
#[derive(Debug, Clone)]
pub struct StreamRequirementBuilder {
    name: String,
    traffic_type: TrafficType,
    bitrate_bps: f64,
    priority: u8,
    max_latency_ms: f64,
    max_jitter_ms: f64,
}

impl StreamRequirementBuilder {
    /// Sets the traffic category.
    pub fn traffic_type(mut self, traffic_type: TrafficType) -> Self {
        self.traffic_type = traffic_type;
        self
    }

    /// Sets the required bitrate in bits per second.
    pub fn bitrate_bps(mut self, bitrate_bps: f64) -> Self {
        self.bitrate_bps = bitrate_bps;
        self
    }

    /// Sets the required bitrate in megabits per second.
    pub fn bitrate_mbps(mut self, bitrate_mbps: f64) -> Self {
        self.bitrate_bps = bitrate_mbps * 1_000_000.0;
        self
    }

    /// Sets the traffic class priority (0-7).
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the latency bound in milliseconds.
    pub fn max_latency_ms(mut self, max_latency_ms: f64) -> Self {
        self.max_latency_ms = max_latency_ms;
        self
    }

    /// Sets the jitter bound in milliseconds.
    pub fn max_jitter_ms(mut self, max_jitter_ms: f64) -> Self {
        self.max_jitter_ms = max_jitter_ms;
        self
    }

    /// Validates all fields and produces the immutable requirement.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidRequirement` - If the name is empty, the bitrate
    ///   is not positive, the priority exceeds 7, or a timing bound is not
    ///   positive
    pub fn build(self) -> Result<StreamRequirement> {
        let invalid = |reason: String| CoreError::InvalidRequirement {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidRequirement {
                name: "<unnamed>".to_string(),
                reason: "stream name must be non-empty".to_string(),
            });
        }

        if !self.bitrate_bps.is_finite() || self.bitrate_bps <= 0.0 {
            return Err(invalid(format!(
                "bitrate must be positive, got {} bps",
                self.bitrate_bps
            )));
        }

        if self.priority > 7 {
            return Err(invalid(format!(
                "priority must be 0-7, got {}",
                self.priority
            )));
        }

        if self.max_latency_ms <= 0.0 {
            return Err(invalid(format!(
                "latency bound must be positive, got {} ms",
                self.max_latency_ms
            )));
        }

        if self.max_jitter_ms <= 0.0 {
            return Err(invalid(format!(
                "jitter bound must be positive, got {} ms",
                self.max_jitter_ms
            )));
        }

        Ok(StreamRequirement {
            name: self.name,
            traffic_type: self.traffic_type,
            bitrate_bps: self.bitrate_bps,
            priority: self.priority,
            max_latency_ms: self.max_latency_ms,
            max_jitter_ms: self.max_jitter_ms,
        })
    }
}
