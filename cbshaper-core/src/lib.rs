//! Cbshaper Core - Credit-Based Shaper parameter engineering
//!
//! This crate provides the building blocks for engineering IEEE 802.1Qav
//! Credit-Based Shaper configurations: per-stream parameter derivation,
//! advisory validation, multi-stream feasibility optimization, and
//! import/export of configuration documents.

pub mod config;
pub mod export;
pub mod shaper;
pub mod stream;

// Re-export main types for convenient access
pub use config::LinkConfig;
pub use export::{CbsConfigDocument, StreamDefinition, StreamDefinitionFile};
pub use shaper::{
    BurstCapacity, CbsParameters, ConfigWarning, DelayAnalysis, FeasibilityReport, StreamOutcome,
    burst_capacity, derive_parameters, optimize_streams, theoretical_delay, validate_parameters,
    validate_with_requirements,
};
pub use stream::{StreamRequirement, TrafficType};

/// Errors that can occur while deriving or importing shaper configurations.
///
/// Derivation fails fast on malformed inputs; advisory validation never
/// produces an error (see [`shaper::validate_parameters`]).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid requirement for stream '{name}': {reason}")]
    InvalidRequirement { name: String, reason: String },

    #[error("Invalid link rate: {rate_bps} bps")]
    InvalidLinkRate { rate_bps: f64 },

    #[error("Invalid link configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Malformed stream definition: {reason}")]
    MalformedInput { reason: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Checks if this error stems from unparseable input rather than
    /// semantically invalid values. CLI wrappers map this to exit code 2.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            CoreError::MalformedInput { .. } | CoreError::Yaml(_) | CoreError::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
