//! Link-level configuration shared by derivation, optimization and export.
//!
//! There is no process-wide default calculator: every operation takes an
//! explicit [`LinkConfig`] so two links with different rates can coexist
//! in one process.

use crate::{CoreError, Result};

/// Immutable description of the shaped link and derivation policy.
///
/// Supports environment variable overrides (`CBSHAPER_*`) for runtime
/// customization.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// Link rate in bits per second
    pub link_rate_bps: f64,
    /// Target aggregate utilization ceiling, 0 < x <= 1
    pub target_utilization: f64,
    /// Burst tolerance multiplier applied to required bitrates, >= 1.0.
    /// `None` uses the per-traffic-type headroom defaults.
    pub burst_tolerance: Option<f64>,
    /// Maximum frame size in bytes used for credit bounds.
    /// `None` uses the per-traffic-type defaults.
    pub max_frame_size: Option<u32>,
}

/// Gigabit Ethernet link rate, the default for automotive backbones.
pub const DEFAULT_LINK_RATE_BPS: f64 = 1_000_000_000.0;

/// Default utilization ceiling recommended for AVB-class traffic.
pub const DEFAULT_TARGET_UTILIZATION: f64 = 0.75;

/// Default burst tolerance multiplier (20% margin).
pub const DEFAULT_BURST_TOLERANCE: f64 = 1.2;

/// Standard Ethernet maximum frame size including VLAN tag.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1522;

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            link_rate_bps: DEFAULT_LINK_RATE_BPS,
            target_utilization: DEFAULT_TARGET_UTILIZATION,
            burst_tolerance: Some(DEFAULT_BURST_TOLERANCE),
            max_frame_size: Some(DEFAULT_MAX_FRAME_SIZE),
        }
    }
}

impl LinkConfig {
    /// Creates a configuration for the given link rate with default policy.
    pub fn new(link_rate_bps: f64) -> Self {
        Self {
            link_rate_bps,
            ..Default::default()
        }
    }

    /// Creates a configuration where headroom and frame sizes follow the
    /// per-traffic-type defaults instead of a single global multiplier.
    pub fn with_type_defaults(link_rate_bps: f64) -> Self {
        Self {
            link_rate_bps,
            target_utilization: DEFAULT_TARGET_UTILIZATION,
            burst_tolerance: None,
            max_frame_size: None,
        }
    }

    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(rate) = std::env::var("CBSHAPER_LINK_RATE_BPS") {
            if let Ok(value) = rate.parse::<f64>() {
                config.link_rate_bps = value;
            }
        }

        if let Ok(target) = std::env::var("CBSHAPER_TARGET_UTILIZATION") {
            if let Ok(value) = target.parse::<f64>() {
                config.target_utilization = value;
            }
        }

        if let Ok(tolerance) = std::env::var("CBSHAPER_BURST_TOLERANCE") {
            if let Ok(value) = tolerance.parse::<f64>() {
                config.burst_tolerance = Some(value);
            }
        }

        if let Ok(size) = std::env::var("CBSHAPER_MAX_FRAME_SIZE") {
            if let Ok(value) = size.parse::<u32>() {
                config.max_frame_size = Some(value);
            }
        }

        config
    }

    /// Checks the configuration for internally consistent values.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidLinkRate` - If the link rate is not positive
    /// - `CoreError::InvalidConfiguration` - If the utilization ceiling or
    ///   burst tolerance is out of range
    pub fn validate(&self) -> Result<()> {
        if !self.link_rate_bps.is_finite() || self.link_rate_bps <= 0.0 {
            return Err(CoreError::InvalidLinkRate {
                rate_bps: self.link_rate_bps,
            });
        }

        if !(self.target_utilization > 0.0 && self.target_utilization <= 1.0) {
            return Err(CoreError::InvalidConfiguration {
                reason: format!(
                    "target utilization {} outside (0, 1]",
                    self.target_utilization
                ),
            });
        }

        if let Some(tolerance) = self.burst_tolerance {
            if !tolerance.is_finite() || tolerance < 1.0 {
                return Err(CoreError::InvalidConfiguration {
                    reason: format!("burst tolerance {tolerance} below 1.0"),
                });
            }
        }

        if let Some(size) = self.max_frame_size {
            if size == 0 {
                return Err(CoreError::InvalidConfiguration {
                    reason: "max frame size must be non-zero".to_string(),
                });
            }
        }

        Ok(())
    }
}
