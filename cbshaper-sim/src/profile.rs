//! Synthetic traffic profiles feeding the simulator.
//!
//! All profiles are seeded: the same seed always produces the identical
//! frame sequence, so simulation runs are reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::simulator::Frame;
use crate::{Result, SimulationError};

/// Smallest Ethernet frame the random profiles will emit, bytes.
const MIN_FRAME_SIZE: u32 = 64;

/// Arrival pattern for one stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TrafficProfile {
    /// Fixed-size frames at evenly spaced intervals
    ConstantBitRate { rate_bps: f64, frame_size: u32 },
    /// Exponentially distributed inter-arrival times with uniformly
    /// random frame sizes in `64..=max_frame_size`
    Poisson {
        mean_rate_bps: f64,
        max_frame_size: u32,
    },
    /// Periodic bursts of closely spaced frames
    Burst {
        burst_len: u32,
        burst_interval_s: f64,
        intra_gap_s: f64,
        frame_size: u32,
    },
}

impl TrafficProfile {
    /// Generates the arrival sequence for `duration_s` simulated seconds.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidProfile` - If rates, sizes or intervals
    ///   are not positive
    pub fn generate(&self, duration_s: f64, seed: u64, stream: &str) -> Result<Vec<Frame>> {
        self.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut frames = Vec::new();

        match *self {
            TrafficProfile::ConstantBitRate {
                rate_bps,
                frame_size,
            } => {
                let interval = f64::from(frame_size) * 8.0 / rate_bps;
                let mut next = 0.0;
                while next < duration_s {
                    frames.push(Frame {
                        arrival_s: next,
                        size_bytes: frame_size,
                        stream: stream.to_string(),
                    });
                    next += interval;
                }
            }
            TrafficProfile::Poisson {
                mean_rate_bps,
                max_frame_size,
            } => {
                let mean_size = f64::from(MIN_FRAME_SIZE + max_frame_size) / 2.0;
                let mean_interval = mean_size * 8.0 / mean_rate_bps;
                let mut next = 0.0;
                while next < duration_s {
                    frames.push(Frame {
                        arrival_s: next,
                        size_bytes: rng.random_range(MIN_FRAME_SIZE..=max_frame_size),
                        stream: stream.to_string(),
                    });
                    // Inverse-transform sample of the exponential
                    let u: f64 = rng.random();
                    next += -mean_interval * (1.0 - u).ln();
                }
            }
            TrafficProfile::Burst {
                burst_len,
                burst_interval_s,
                intra_gap_s,
                frame_size,
            } => {
                let mut burst_start = 0.0;
                while burst_start < duration_s {
                    for i in 0..burst_len {
                        let arrival = burst_start + f64::from(i) * intra_gap_s;
                        if arrival >= duration_s {
                            break;
                        }
                        frames.push(Frame {
                            arrival_s: arrival,
                            size_bytes: frame_size,
                            stream: stream.to_string(),
                        });
                    }
                    burst_start += burst_interval_s;
                }
            }
        }

        Ok(frames)
    }

    fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(SimulationError::InvalidProfile { reason });

        match *self {
            TrafficProfile::ConstantBitRate {
                rate_bps,
                frame_size,
            } => {
                if !(rate_bps > 0.0) {
                    return fail(format!("rate {rate_bps} bps not positive"));
                }
                if frame_size == 0 {
                    return fail("frame size must be non-zero".to_string());
                }
            }
            TrafficProfile::Poisson {
                mean_rate_bps,
                max_frame_size,
            } => {
                if !(mean_rate_bps > 0.0) {
                    return fail(format!("mean rate {mean_rate_bps} bps not positive"));
                }
                if max_frame_size < MIN_FRAME_SIZE {
                    return fail(format!(
                        "max frame size {max_frame_size} below minimum {MIN_FRAME_SIZE}"
                    ));
                }
            }
            TrafficProfile::Burst {
                burst_len,
                burst_interval_s,
                intra_gap_s,
                frame_size,
            } => {
                if burst_len == 0 {
                    return fail("burst length must be non-zero".to_string());
                }
                if !(burst_interval_s > 0.0) {
                    return fail(format!("burst interval {burst_interval_s} s not positive"));
                }
                if intra_gap_s < 0.0 {
                    return fail(format!("intra-burst gap {intra_gap_s} s negative"));
                }
                if frame_size == 0 {
                    return fail("frame size must be non-zero".to_string());
                }
            }
        }

        Ok(())
    }
}
