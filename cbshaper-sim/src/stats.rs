//! Reduction of per-frame schedules into summary statistics.

use serde::{Deserialize, Serialize};

use crate::simulator::SimulationResult;

/// Latency distribution of the transmitted frames, seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub mean_s: f64,
    pub median_s: f64,
    pub p95_s: f64,
    pub p99_s: f64,
    pub max_s: f64,
}

/// Jitter (absolute consecutive latency differences), seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JitterStats {
    pub mean_s: f64,
    pub stddev_s: f64,
}

/// Aggregated metrics for one queue's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub frames_transmitted: u64,
    pub frames_dropped: u64,
    /// Dropped over total evaluated frames, 0..=1
    pub loss_ratio: f64,
    pub latency: LatencyStats,
    pub jitter: JitterStats,
    /// Bits transmitted over (duration x idle slope)
    pub bandwidth_efficiency: f64,
}

/// Summary of a simulation, including the empty case.
///
/// An idle simulation is a valid outcome, not an error, so the empty
/// variant is part of the type rather than an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SimulationSummary {
    /// No frames were evaluated
    NoData,
    /// Metrics over at least one evaluated frame
    Complete(SummaryStats),
}

impl SimulationSummary {
    /// Returns the statistics when the run produced any.
    pub fn stats(&self) -> Option<&SummaryStats> {
        match self {
            SimulationSummary::Complete(stats) => Some(stats),
            SimulationSummary::NoData => None,
        }
    }
}

/// Reduces a simulation result into summary metrics.
///
/// Pure reduction over the result; the result itself is left untouched.
pub fn summarize(result: &SimulationResult) -> SimulationSummary {
    let total = result.frames_transmitted + result.frames_dropped;
    if total == 0 {
        return SimulationSummary::NoData;
    }

    let mut latencies: Vec<f64> = result.records.iter().filter_map(|r| r.latency_s).collect();

    // Jitter over latencies in transmission order
    let jitter_samples: Vec<f64> = latencies
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect();

    latencies.sort_by(f64::total_cmp);

    let latency = if latencies.is_empty() {
        // Every evaluated frame was dropped
        LatencyStats {
            mean_s: 0.0,
            median_s: 0.0,
            p95_s: 0.0,
            p99_s: 0.0,
            max_s: 0.0,
        }
    } else {
        LatencyStats {
            mean_s: latencies.iter().sum::<f64>() / latencies.len() as f64,
            median_s: percentile(&latencies, 0.50),
            p95_s: percentile(&latencies, 0.95),
            p99_s: percentile(&latencies, 0.99),
            max_s: latencies[latencies.len() - 1],
        }
    };

    let jitter = if jitter_samples.is_empty() {
        JitterStats {
            mean_s: 0.0,
            stddev_s: 0.0,
        }
    } else {
        let mean = jitter_samples.iter().sum::<f64>() / jitter_samples.len() as f64;
        let variance = jitter_samples
            .iter()
            .map(|j| (j - mean).powi(2))
            .sum::<f64>()
            / jitter_samples.len() as f64;
        JitterStats {
            mean_s: mean,
            stddev_s: variance.sqrt(),
        }
    };

    let reserved_bits = result.duration_s * result.idle_slope_bps;
    let bandwidth_efficiency = if reserved_bits > 0.0 {
        result.bits_transmitted / reserved_bits
    } else {
        0.0
    };

    SimulationSummary::Complete(SummaryStats {
        frames_transmitted: result.frames_transmitted,
        frames_dropped: result.frames_dropped,
        loss_ratio: result.frames_dropped as f64 / total as f64,
        latency,
        jitter,
        bandwidth_efficiency,
    })
}

/// Linear-interpolation percentile over sorted samples.
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = quantile * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let fraction = rank - low as f64;
        sorted[low] + (sorted[high] - sorted[low]) * fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::FrameRecord;

    fn result_with_latencies(latencies_s: &[f64]) -> SimulationResult {
        let records: Vec<FrameRecord> = latencies_s
            .iter()
            .enumerate()
            .map(|(i, latency)| FrameRecord {
                stream: "s".to_string(),
                arrival_s: i as f64 * 0.001,
                size_bytes: 1500,
                start_s: Some(i as f64 * 0.001),
                end_s: Some(i as f64 * 0.001 + latency),
                latency_s: Some(*latency),
                dropped: false,
            })
            .collect();

        SimulationResult {
            frames_transmitted: records.len() as u64,
            frames_dropped: 0,
            bits_transmitted: records.len() as f64 * 12_000.0,
            duration_s: 1.0,
            idle_slope_bps: 100_000_000.0,
            records,
        }
    }

    #[test]
    fn test_empty_result_yields_no_data() {
        let result = SimulationResult {
            records: Vec::new(),
            frames_transmitted: 0,
            frames_dropped: 0,
            bits_transmitted: 0.0,
            duration_s: 0.0,
            idle_slope_bps: 100_000_000.0,
        };

        assert_eq!(summarize(&result), SimulationSummary::NoData);
    }

    #[test]
    fn test_latency_percentiles() {
        let latencies: Vec<f64> = (1..=100).map(|i| i as f64 * 1e-6).collect();
        let summary = summarize(&result_with_latencies(&latencies));

        let stats = summary.stats().unwrap();
        assert!((stats.latency.mean_s - 50.5e-6).abs() < 1e-12);
        assert!((stats.latency.median_s - 50.5e-6).abs() < 1e-12);
        assert!((stats.latency.p95_s - 95.05e-6).abs() < 1e-12);
        assert!((stats.latency.max_s - 100e-6).abs() < 1e-12);
    }

    #[test]
    fn test_constant_latency_has_zero_jitter() {
        let summary = summarize(&result_with_latencies(&[12e-6; 50]));

        let stats = summary.stats().unwrap();
        assert_eq!(stats.jitter.mean_s, 0.0);
        assert_eq!(stats.jitter.stddev_s, 0.0);
    }

    #[test]
    fn test_alternating_latency_jitter() {
        let latencies: Vec<f64> = (0..10)
            .map(|i| if i % 2 == 0 { 10e-6 } else { 20e-6 })
            .collect();
        let summary = summarize(&result_with_latencies(&latencies));

        let stats = summary.stats().unwrap();
        assert!((stats.jitter.mean_s - 10e-6).abs() < 1e-12);
        assert!(stats.jitter.stddev_s < 1e-12);
    }

    #[test]
    fn test_loss_ratio_counts_drops() {
        let mut result = result_with_latencies(&[10e-6; 8]);
        result.frames_dropped = 2;

        let stats = summarize(&result);
        assert_eq!(stats.stats().unwrap().loss_ratio, 0.2);
    }

    #[test]
    fn test_bandwidth_efficiency() {
        // 100 frames x 12,000 bits over 1 s against a 100 Mbps reservation
        let summary = summarize(&result_with_latencies(&[12e-6; 100]));

        let stats = summary.stats().unwrap();
        assert!((stats.bandwidth_efficiency - 0.012).abs() < 1e-12);
    }

    #[test]
    fn test_single_sample() {
        let summary = summarize(&result_with_latencies(&[42e-6]));

        let stats = summary.stats().unwrap();
        assert_eq!(stats.latency.median_s, 42e-6);
        assert_eq!(stats.latency.p99_s, 42e-6);
        assert_eq!(stats.jitter.mean_s, 0.0);
    }

    #[test]
    fn test_summary_serde_round_trip() {
        let summary = summarize(&result_with_latencies(&[10e-6, 20e-6, 30e-6]));

        let json = serde_json::to_string(&summary).unwrap();
        let parsed: SimulationSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);

        let no_data = serde_json::to_string(&SimulationSummary::NoData).unwrap();
        let parsed: SimulationSummary = serde_json::from_str(&no_data).unwrap();
        assert_eq!(parsed, SimulationSummary::NoData);
    }
}
