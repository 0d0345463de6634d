//! Import and export of configuration documents.
//!
//! Three surfaces: a structured configuration document (YAML/JSON) for
//! downstream hardware-configuration tooling, a CSV table for spreadsheet
//! and report tooling, and a stream definition file format for feeding
//! requirements into derivation.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::config::LinkConfig;
use crate::shaper::CbsParameters;
use crate::stream::{StreamRequirement, TrafficType};
use crate::{CoreError, Result};

/// QoS bounds carried alongside derived parameters for reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosRequirements {
    pub max_latency_ms: f64,
    pub max_jitter_ms: f64,
}

/// One stream entry in the configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    #[serde(flatten)]
    pub parameters: CbsParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qos: Option<QosRequirements>,
}

/// Structured configuration document consumed by config-push tooling.
///
/// Exporting and re-importing reproduces identical parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CbsConfigDocument {
    pub link_rate_bps: f64,
    pub target_utilization: f64,
    pub generated_at: String,
    pub streams: Vec<ConfiguredStream>,
}

impl CbsConfigDocument {
    /// Assembles a document from derived parameters, attaching QoS bounds
    /// for streams whose requirements are supplied (matched by name).
    pub fn new(
        params: &[CbsParameters],
        requirements: &[StreamRequirement],
        config: &LinkConfig,
    ) -> Self {
        let streams = params
            .iter()
            .map(|parameters| {
                let qos = requirements
                    .iter()
                    .find(|r| r.name() == parameters.stream)
                    .map(|r| QosRequirements {
                        max_latency_ms: r.max_latency_ms(),
                        max_jitter_ms: r.max_jitter_ms(),
                    });
                ConfiguredStream {
                    parameters: parameters.clone(),
                    qos,
                }
            })
            .collect();

        Self {
            link_rate_bps: config.link_rate_bps,
            target_utilization: config.target_utilization,
            generated_at: chrono::Utc::now().to_rfc3339(),
            streams,
        }
    }

    /// Serializes the document to YAML.
    ///
    /// # Errors
    ///
    /// - `CoreError::Yaml` - If serialization fails
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parses a document from YAML.
    ///
    /// # Errors
    ///
    /// - `CoreError::Yaml` - If the input is not a valid document
    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Serializes the document to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// - `CoreError::Json` - If serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a document from JSON.
    ///
    /// # Errors
    ///
    /// - `CoreError::Json` - If the input is not a valid document
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Renders the parameter table as CSV, one row per stream.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(
            "stream,traffic_type,priority,idle_slope_bps,send_slope_bps,\
             hi_credit_bits,lo_credit_bits,max_frame_size,reserved_bandwidth_bps,efficiency\n",
        );

        for stream in &self.streams {
            let p = &stream.parameters;
            let _ = writeln!(
                csv,
                "{},{},{},{},{},{},{},{},{},{}",
                p.stream,
                p.traffic_type,
                p.priority,
                p.idle_slope_bps,
                p.send_slope_bps,
                p.hi_credit_bits,
                p.lo_credit_bits,
                p.max_frame_size,
                p.reserved_bandwidth_bps,
                p.efficiency
            );
        }

        csv
    }
}

/// One stream record in a definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDefinition {
    pub name: String,
    pub traffic_type: TrafficType,
    pub bitrate_mbps: f64,
    pub priority: u8,
    pub max_latency_ms: f64,
    pub max_jitter_ms: f64,
}

/// Top-level stream definition file: the input format for derivation
/// and optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDefinitionFile {
    pub streams: Vec<StreamDefinition>,
}

impl StreamDefinitionFile {
    /// Parses stream definitions from YAML (also accepts JSON, which is a
    /// YAML subset).
    ///
    /// # Errors
    ///
    /// - `CoreError::MalformedInput` - If the input cannot be parsed
    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).map_err(|error| CoreError::MalformedInput {
            reason: error.to_string(),
        })
    }

    /// Serializes the definitions back to YAML.
    ///
    /// # Errors
    ///
    /// - `CoreError::Yaml` - If serialization fails
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validates every record and converts it into a requirement.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidRequirement` - For the first record with
    ///   out-of-range fields
    pub fn into_requirements(self) -> Result<Vec<StreamRequirement>> {
        self.streams
            .into_iter()
            .map(|definition| {
                StreamRequirement::builder(definition.name)
                    .traffic_type(definition.traffic_type)
                    .bitrate_mbps(definition.bitrate_mbps)
                    .priority(definition.priority)
                    .max_latency_ms(definition.max_latency_ms)
                    .max_jitter_ms(definition.max_jitter_ms)
                    .build()
            })
            .collect()
    }

    /// Example definition file used by the CLI `template` command.
    pub fn template() -> Self {
        Self {
            streams: vec![
                StreamDefinition {
                    name: "emergency_brake".to_string(),
                    traffic_type: TrafficType::SafetyCritical,
                    bitrate_mbps: 2.0,
                    priority: 7,
                    max_latency_ms: 5.0,
                    max_jitter_ms: 0.5,
                },
                StreamDefinition {
                    name: "front_camera_4k".to_string(),
                    traffic_type: TrafficType::Video4k,
                    bitrate_mbps: 25.0,
                    priority: 6,
                    max_latency_ms: 20.0,
                    max_jitter_ms: 3.0,
                },
                StreamDefinition {
                    name: "lidar_main".to_string(),
                    traffic_type: TrafficType::Lidar,
                    bitrate_mbps: 100.0,
                    priority: 4,
                    max_latency_ms: 40.0,
                    max_jitter_ms: 4.0,
                },
                StreamDefinition {
                    name: "infotainment".to_string(),
                    traffic_type: TrafficType::Infotainment,
                    bitrate_mbps: 50.0,
                    priority: 1,
                    max_latency_ms: 500.0,
                    max_jitter_ms: 50.0,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaper::derive_parameters;

    fn sample_document() -> (CbsConfigDocument, Vec<StreamRequirement>) {
        let config = LinkConfig::default();
        let requirements = StreamDefinitionFile::template()
            .into_requirements()
            .unwrap();
        let params: Vec<CbsParameters> = requirements
            .iter()
            .map(|r| derive_parameters(r, &config).unwrap())
            .collect();
        (
            CbsConfigDocument::new(&params, &requirements, &config),
            requirements,
        )
    }

    #[test]
    fn test_yaml_round_trip_is_lossless() {
        let (document, _) = sample_document();

        let yaml = document.to_yaml().unwrap();
        let parsed = CbsConfigDocument::from_yaml(&yaml).unwrap();

        assert_eq!(parsed, document);
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let (document, _) = sample_document();

        let json = document.to_json().unwrap();
        let parsed = CbsConfigDocument::from_json(&json).unwrap();

        assert_eq!(parsed, document);
    }

    #[test]
    fn test_qos_bounds_attached_by_name() {
        let (document, requirements) = sample_document();

        for stream in &document.streams {
            let requirement = requirements
                .iter()
                .find(|r| r.name() == stream.parameters.stream)
                .unwrap();
            let qos = stream.qos.as_ref().unwrap();
            assert_eq!(qos.max_latency_ms, requirement.max_latency_ms());
            assert_eq!(qos.max_jitter_ms, requirement.max_jitter_ms());
        }
    }

    #[test]
    fn test_csv_has_row_per_stream() {
        let (document, requirements) = sample_document();

        let csv = document.to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), requirements.len() + 1);
        assert!(lines[0].starts_with("stream,traffic_type,priority,idle_slope_bps"));
        assert!(lines[1..].iter().any(|l| l.starts_with("front_camera_4k,")));
    }

    #[test]
    fn test_definition_file_round_trip() {
        let template = StreamDefinitionFile::template();

        let yaml = template.to_yaml().unwrap();
        let parsed = StreamDefinitionFile::from_yaml(&yaml).unwrap();

        assert_eq!(parsed, template);
    }

    #[test]
    fn test_definition_file_accepts_json() {
        let json = r#"{
            "streams": [{
                "name": "radar",
                "traffic_type": "radar",
                "bitrate_mbps": 16.0,
                "priority": 3,
                "max_latency_ms": 20.0,
                "max_jitter_ms": 2.0
            }]
        }"#;

        let parsed = StreamDefinitionFile::from_yaml(json).unwrap();
        assert_eq!(parsed.streams.len(), 1);
        assert_eq!(parsed.streams[0].traffic_type, TrafficType::Radar);
    }

    #[test]
    fn test_malformed_input_maps_to_parse_error() {
        let error = StreamDefinitionFile::from_yaml("streams: {not a list").unwrap_err();
        assert!(error.is_parse_error());
    }

    #[test]
    fn test_invalid_record_rejected_on_conversion() {
        let mut file = StreamDefinitionFile::template();
        file.streams[0].priority = 9;

        assert!(matches!(
            file.into_requirements(),
            Err(CoreError::InvalidRequirement { .. })
        ));
    }
}
