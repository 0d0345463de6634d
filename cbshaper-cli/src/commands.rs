//! Subcommand implementations and exit-code mapping.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use tracing::error;

use cbshaper_core::{
    CbsConfigDocument, CoreError, LinkConfig, StreamDefinitionFile, StreamOutcome, TrafficType,
    burst_capacity, derive_parameters, optimize_streams, theoretical_delay, validate_parameters,
};
use cbshaper_sim::{
    CreditPolicy, QueueSetup, SimulationReport, TrafficProfile, simulate_queues,
};

/// Exit code for semantically invalid or infeasible configurations.
const EXIT_INVALID: i32 = 1;

/// Exit code for input that could not be parsed at all.
const EXIT_MALFORMED: i32 = 2;

/// Tolerance when re-checking the slope identity of imported documents.
const SLOPE_TOLERANCE_BPS: f64 = 1.0;

/// Link-level flags shared by every subcommand.
///
/// Unset flags fall back to the `CBSHAPER_*` environment variables,
/// then to the built-in defaults (1 Gbps, 0.75 ceiling, 1.2x
/// tolerance, 1522 B frames).
#[derive(Debug, Args)]
pub struct LinkArgs {
    /// Link speed in bits per second [default: 1e9 or CBSHAPER_LINK_RATE_BPS]
    #[arg(long)]
    pub link_speed: Option<f64>,

    /// Aggregate utilization ceiling (0, 1] [default: 0.75 or CBSHAPER_TARGET_UTILIZATION]
    #[arg(long)]
    pub target_utilization: Option<f64>,

    /// Burst tolerance multiplier applied to required bitrates [default: 1.2 or CBSHAPER_BURST_TOLERANCE]
    #[arg(long)]
    pub burst_tolerance: Option<f64>,

    /// Maximum frame size in bytes for credit bounds [default: 1522 or CBSHAPER_MAX_FRAME_SIZE]
    #[arg(long)]
    pub max_frame_size: Option<u32>,
}

impl LinkArgs {
    fn to_config(&self) -> LinkConfig {
        let mut config = LinkConfig::from_env();
        if let Some(rate) = self.link_speed {
            config.link_rate_bps = rate;
        }
        if let Some(target) = self.target_utilization {
            config.target_utilization = target;
        }
        if let Some(tolerance) = self.burst_tolerance {
            config.burst_tolerance = Some(tolerance);
        }
        if let Some(size) = self.max_frame_size {
            config.max_frame_size = Some(size);
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Zero credit when the queue drains
    Reset,
    /// Keep accruing idle credit while empty (802.1Qav-style)
    Standard,
}

impl From<PolicyArg> for CreditPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Reset => CreditPolicy::ResetOnEmpty,
            PolicyArg::Standard => CreditPolicy::StandardAccrual,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Derive CBS parameters for a single stream
    Derive {
        /// Stream name
        name: String,
        /// Required bitrate in Mbps
        bitrate_mbps: f64,
        /// Traffic type tag (e.g. video_4k, lidar, control)
        #[arg(long, default_value = "video_1080p")]
        traffic_type: String,
        /// Traffic class priority, 0-7
        #[arg(long, default_value_t = 5)]
        priority: u8,
        /// Latency bound in milliseconds
        #[arg(long, default_value_t = 100.0)]
        max_latency_ms: f64,
        /// Jitter bound in milliseconds
        #[arg(long, default_value_t = 10.0)]
        max_jitter_ms: f64,
    },
    /// Optimize a stream definition file under the utilization ceiling
    Optimize {
        /// Stream definition file (YAML or JSON)
        streams: PathBuf,
        /// Export format for the configuration document
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
        /// Write the document here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Simulate every feasible stream against a synthetic profile
    Simulate {
        /// Stream definition file (YAML or JSON)
        streams: PathBuf,
        /// Simulated duration in seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Deterministic seed for traffic generation
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Credit behavior when a queue drains
        #[arg(long, value_enum, default_value_t = PolicyArg::Reset)]
        policy: PolicyArg,
        /// Drop arrivals beyond this queue depth (unbounded if absent)
        #[arg(long)]
        queue_depth: Option<usize>,
        /// Stop each queue after this many frames
        #[arg(long)]
        max_frames: Option<usize>,
        /// Directory for per-stream JSON reports
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
    /// Check an exported configuration document for warnings
    Validate {
        /// Configuration document (YAML or JSON)
        config: PathBuf,
    },
    /// Write an example stream definition file
    Template {
        /// Output path; stdout if absent
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Runs a subcommand and maps errors to the exit-code convention.
pub fn handle_command(link: &LinkArgs, command: Commands) -> i32 {
    match run(link, command) {
        Ok(code) => code,
        Err(failure) => {
            error!("{}", failure.message);
            eprintln!("error: {}", failure.message);
            failure.exit_code
        }
    }
}

struct CommandFailure {
    message: String,
    exit_code: i32,
}

impl From<CoreError> for CommandFailure {
    fn from(error: CoreError) -> Self {
        let exit_code = if error.is_parse_error() {
            EXIT_MALFORMED
        } else {
            EXIT_INVALID
        };
        Self {
            message: error.to_string(),
            exit_code,
        }
    }
}

impl From<cbshaper_sim::SimulationError> for CommandFailure {
    fn from(error: cbshaper_sim::SimulationError) -> Self {
        Self {
            message: error.to_string(),
            exit_code: EXIT_INVALID,
        }
    }
}

impl From<std::io::Error> for CommandFailure {
    fn from(error: std::io::Error) -> Self {
        Self {
            message: error.to_string(),
            exit_code: EXIT_MALFORMED,
        }
    }
}

fn run(link: &LinkArgs, command: Commands) -> Result<i32, CommandFailure> {
    let config = link.to_config();

    match command {
        Commands::Derive {
            name,
            bitrate_mbps,
            traffic_type,
            priority,
            max_latency_ms,
            max_jitter_ms,
        } => {
            let requirement = cbshaper_core::StreamRequirement::builder(name)
                .traffic_type(TrafficType::from(traffic_type))
                .bitrate_mbps(bitrate_mbps)
                .priority(priority)
                .max_latency_ms(max_latency_ms)
                .max_jitter_ms(max_jitter_ms)
                .build()?;

            let params = derive_parameters(&requirement, &config)?;
            let delay = theoretical_delay(&params, config.link_rate_bps);
            let burst = burst_capacity(&params);

            println!("stream: {}", params.stream);
            println!("  idle slope:  {:>14.0} bps", params.idle_slope_bps);
            println!("  send slope:  {:>14.0} bps", params.send_slope_bps);
            println!("  hi credit:   {:>14.1} bits", params.hi_credit_bits);
            println!("  lo credit:   {:>14.1} bits", params.lo_credit_bits);
            println!("  efficiency:  {:>13.1}%", params.efficiency * 100.0);
            println!("  predicted delay: {:.3} ms", delay.total_ms());
            println!("  burst capacity:  {:.0} bytes", burst.capacity_bytes);
            Ok(0)
        }

        Commands::Optimize {
            streams,
            format,
            output,
        } => {
            let requirements = load_requirements(&streams)?;
            let report = optimize_streams(&requirements, &config)?;

            for (name, outcome) in &report.outcomes {
                match outcome {
                    StreamOutcome::Feasible(params) => {
                        println!(
                            "{name}: feasible, idle slope {:.0} bps (efficiency {:.1}%)",
                            params.idle_slope_bps,
                            params.efficiency * 100.0
                        );
                    }
                    StreamOutcome::InfeasibleUnderTarget {
                        required_bps,
                        granted_bps,
                    } => {
                        println!(
                            "{name}: infeasible under target (needs {required_bps:.0} bps, \
                             cut would grant {granted_bps:.0} bps)"
                        );
                    }
                    StreamOutcome::Rejected { reason } => {
                        println!("{name}: rejected ({reason})");
                    }
                }
            }
            println!(
                "aggregate: {:.0} bps ({:.1}% of link)",
                report.aggregate_idle_slope_bps(),
                report.utilization() * 100.0
            );

            let params: Vec<_> = report
                .feasible_parameters()
                .into_iter()
                .cloned()
                .collect();
            for warning in validate_parameters(&params, &config) {
                println!("warning: {warning}");
            }

            let document = CbsConfigDocument::new(&params, &requirements, &config);
            let rendered = match format {
                OutputFormat::Yaml => document.to_yaml()?,
                OutputFormat::Json => document.to_json()?,
                OutputFormat::Csv => document.to_csv(),
            };
            match output {
                Some(path) => std::fs::write(path, rendered)?,
                None => println!("{rendered}"),
            }

            if report.has_infeasible() || report.has_rejected() {
                Ok(EXIT_INVALID)
            } else {
                Ok(0)
            }
        }

        Commands::Simulate {
            streams,
            duration,
            seed,
            policy,
            queue_depth,
            max_frames,
            report_dir,
        } => {
            let requirements = load_requirements(&streams)?;
            let feasibility = optimize_streams(&requirements, &config)?;

            let mut queues = Vec::new();
            for (name, outcome) in &feasibility.outcomes {
                let StreamOutcome::Feasible(params) = outcome else {
                    eprintln!("skipping {name}: not feasible under target");
                    continue;
                };
                let Some(requirement) = requirements.iter().find(|r| r.name() == *name) else {
                    continue;
                };
                let profile = TrafficProfile::ConstantBitRate {
                    rate_bps: requirement.bitrate_bps(),
                    frame_size: params.max_frame_size.min(1500),
                };
                let frames = profile.generate(duration, seed, name)?;
                let setup = QueueSetup {
                    params: params.clone(),
                    link_rate_bps: config.link_rate_bps,
                    policy: policy.into(),
                    max_queue_depth: queue_depth,
                    max_frames,
                };
                queues.push((setup, frames));
            }

            // Results come back in queue order; the parameters carry the
            // stream name even when a run produced no records
            let queue_params: Vec<_> = queues
                .iter()
                .map(|(setup, _)| setup.params.clone())
                .collect();
            let results = simulate_queues(queues)?;

            for (params, result) in queue_params.into_iter().zip(results) {
                let report = SimulationReport::new(params, result);
                match report.summary.stats() {
                    Some(stats) => println!(
                        "{}: {} transmitted, {} dropped, mean latency {:.1} us, \
                         p99 {:.1} us, efficiency {:.1}%",
                        report.stream,
                        stats.frames_transmitted,
                        stats.frames_dropped,
                        stats.latency.mean_s * 1e6,
                        stats.latency.p99_s * 1e6,
                        stats.bandwidth_efficiency * 100.0
                    ),
                    None => println!("{}: no frames simulated", report.stream),
                }

                if let Some(dir) = &report_dir {
                    std::fs::create_dir_all(dir)?;
                    let path = dir.join(format!("{}.json", report.stream));
                    std::fs::write(path, report.to_json()?)?;
                }
            }

            if feasibility.has_infeasible() || feasibility.has_rejected() {
                Ok(EXIT_INVALID)
            } else {
                Ok(0)
            }
        }

        Commands::Validate { config: path } => {
            let input = std::fs::read_to_string(&path)?;
            let document = parse_document(&path, &input)?;

            let params: Vec<_> = document
                .streams
                .iter()
                .map(|s| s.parameters.clone())
                .collect();

            // Hard consistency first: a document violating the slope
            // identity cannot have come from a valid derivation
            for param in &params {
                let identity = param.send_slope_bps + document.link_rate_bps
                    - param.idle_slope_bps;
                if identity.abs() > SLOPE_TOLERANCE_BPS
                    || param.idle_slope_bps <= 0.0
                    || param.send_slope_bps >= 0.0
                    || param.hi_credit_bits <= 0.0
                    || param.lo_credit_bits >= 0.0
                {
                    eprintln!("error: {}: inconsistent CBS parameters", param.stream);
                    return Ok(EXIT_INVALID);
                }
            }

            let link = LinkConfig {
                link_rate_bps: document.link_rate_bps,
                target_utilization: document.target_utilization,
                ..LinkConfig::default()
            };
            let warnings = validate_parameters(&params, &link);
            if warnings.is_empty() {
                println!("ok: {} streams, no warnings", params.len());
            } else {
                for warning in &warnings {
                    println!("warning: {warning}");
                }
            }
            Ok(0)
        }

        Commands::Template { output } => {
            let rendered = StreamDefinitionFile::template().to_yaml()?;
            match output {
                Some(path) => std::fs::write(path, rendered)?,
                None => println!("{rendered}"),
            }
            Ok(0)
        }
    }
}

fn load_requirements(
    path: &Path,
) -> Result<Vec<cbshaper_core::StreamRequirement>, CommandFailure> {
    let input = std::fs::read_to_string(path)?;
    let file = StreamDefinitionFile::from_yaml(&input)?;
    Ok(file.into_requirements()?)
}

fn parse_document(path: &Path, input: &str) -> Result<CbsConfigDocument, CommandFailure> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        CbsConfigDocument::from_json(input)
    } else {
        CbsConfigDocument::from_yaml(input)
    };
    Ok(parsed?)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every flag explicit, so concurrent env-variable tests cannot
    // leak into the derived configuration
    fn link_args() -> LinkArgs {
        LinkArgs {
            link_speed: Some(1e9),
            target_utilization: Some(0.75),
            burst_tolerance: Some(1.2),
            max_frame_size: Some(1522),
        }
    }

    #[test]
    fn test_link_args_build_config() {
        let config = link_args().to_config();
        assert_eq!(config.link_rate_bps, 1e9);
        assert_eq!(config.burst_tolerance, Some(1.2));
    }

    #[test]
    fn test_unset_flags_fall_back_to_env() {
        unsafe {
            std::env::set_var("CBSHAPER_LINK_RATE_BPS", "100000000");
        }

        let args = LinkArgs {
            link_speed: None,
            target_utilization: Some(0.6),
            burst_tolerance: None,
            max_frame_size: None,
        };
        let config = args.to_config();

        unsafe {
            std::env::remove_var("CBSHAPER_LINK_RATE_BPS");
        }

        assert_eq!(config.link_rate_bps, 100_000_000.0);
        assert_eq!(config.target_utilization, 0.6);
    }

    #[test]
    fn test_template_round_trips_through_optimize() {
        let dir = tempfile::tempdir().unwrap();
        let streams = dir.path().join("streams.yaml");
        std::fs::write(
            &streams,
            StreamDefinitionFile::template().to_yaml().unwrap(),
        )
        .unwrap();

        let code = handle_command(
            &link_args(),
            Commands::Optimize {
                streams,
                format: OutputFormat::Yaml,
                output: Some(dir.path().join("config.yaml")),
            },
        );
        assert_eq!(code, 0);

        let rendered = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        let document = CbsConfigDocument::from_yaml(&rendered).unwrap();
        assert_eq!(document.streams.len(), 4);
    }

    #[test]
    fn test_malformed_streams_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let streams = dir.path().join("broken.yaml");
        std::fs::write(&streams, "streams: {not a list").unwrap();

        let code = handle_command(
            &link_args(),
            Commands::Optimize {
                streams,
                format: OutputFormat::Yaml,
                output: None,
            },
        );
        assert_eq!(code, EXIT_MALFORMED);
    }

    #[test]
    fn test_infeasible_streams_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let streams = dir.path().join("streams.yaml");
        std::fs::write(
            &streams,
            "streams:\n\
             - name: a\n  traffic_type: video_4k\n  bitrate_mbps: 400.0\n  priority: 6\n\
             \x20 max_latency_ms: 20.0\n  max_jitter_ms: 3.0\n\
             - name: b\n  traffic_type: video_4k\n  bitrate_mbps: 400.0\n  priority: 6\n\
             \x20 max_latency_ms: 20.0\n  max_jitter_ms: 3.0\n",
        )
        .unwrap();

        let code = handle_command(
            &link_args(),
            Commands::Optimize {
                streams,
                format: OutputFormat::Yaml,
                output: Some(dir.path().join("out.yaml")),
            },
        );
        assert_eq!(code, EXIT_INVALID);
    }

    #[test]
    fn test_simulate_zero_budget_writes_no_data_reports() {
        let dir = tempfile::tempdir().unwrap();
        let streams = dir.path().join("streams.yaml");
        std::fs::write(
            &streams,
            StreamDefinitionFile::template().to_yaml().unwrap(),
        )
        .unwrap();
        let reports = dir.path().join("reports");

        let code = handle_command(
            &link_args(),
            Commands::Simulate {
                streams,
                duration: 0.1,
                seed: 7,
                policy: PolicyArg::Reset,
                queue_depth: None,
                max_frames: Some(0),
                report_dir: Some(reports.clone()),
            },
        );
        assert_eq!(code, 0);

        // Every stream gets a report even though no frame was evaluated
        let mut count = 0;
        for entry in std::fs::read_dir(&reports).unwrap() {
            let contents = std::fs::read_to_string(entry.unwrap().path()).unwrap();
            let report = SimulationReport::from_json(&contents).unwrap();
            assert!(!report.stream.is_empty());
            assert!(report.summary.stats().is_none());
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn test_validate_accepts_exported_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = link_args().to_config();
        let requirements = StreamDefinitionFile::template()
            .into_requirements()
            .unwrap();
        let report = optimize_streams(&requirements, &config).unwrap();
        let params: Vec<_> = report
            .feasible_parameters()
            .into_iter()
            .cloned()
            .collect();
        let document = CbsConfigDocument::new(&params, &requirements, &config);

        let path = dir.path().join("config.yaml");
        std::fs::write(&path, document.to_yaml().unwrap()).unwrap();

        let code = handle_command(&link_args(), Commands::Validate { config: path });
        assert_eq!(code, 0);
    }

    #[test]
    fn test_validate_rejects_inconsistent_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = link_args().to_config();
        let requirements = StreamDefinitionFile::template()
            .into_requirements()
            .unwrap();
        let report = optimize_streams(&requirements, &config).unwrap();
        let mut params: Vec<_> = report
            .feasible_parameters()
            .into_iter()
            .cloned()
            .collect();
        params[0].send_slope_bps = 1.0; // breaks the slope identity
        let document = CbsConfigDocument::new(&params, &requirements, &config);

        let path = dir.path().join("config.yaml");
        std::fs::write(&path, document.to_yaml().unwrap()).unwrap();

        let code = handle_command(&link_args(), Commands::Validate { config: path });
        assert_eq!(code, EXIT_INVALID);
    }
}
