//! Discrete-event replay of a frame sequence against one shaped queue.
//!
//! The loop processes events in timestamp order and mutates a single
//! [`CreditState`]; nothing is shared across queues, so independent
//! queues can be replayed in parallel with [`simulate_queues`].

use std::collections::VecDeque;

use cbshaper_core::CbsParameters;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credit::{CreditPolicy, CreditState, QueueMode};
use crate::{Result, SimulationError};

/// Slack below which a negative credit counts as eligible, seconds.
/// Absorbs rounding from the accrual arithmetic.
const ELIGIBILITY_SLACK_S: f64 = 1e-12;

/// One simulated frame arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Arrival timestamp, seconds from simulation start
    pub arrival_s: f64,
    /// Frame size in bytes
    pub size_bytes: u32,
    /// Owning stream identifier
    pub stream: String,
}

impl Frame {
    /// Frame size in bits.
    pub fn bits(&self) -> f64 {
        f64::from(self.size_bytes) * 8.0
    }
}

/// Per-frame outcome of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub stream: String,
    pub arrival_s: f64,
    pub size_bytes: u32,
    /// Transmission start, absent for dropped frames
    pub start_s: Option<f64>,
    /// Transmission end, absent for dropped frames
    pub end_s: Option<f64>,
    /// End-to-end latency (end minus arrival), absent for dropped frames
    pub latency_s: Option<f64>,
    pub dropped: bool,
}

/// Complete schedule and counters from one queue's replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Per-frame outcomes in arrival order
    pub records: Vec<FrameRecord>,
    pub frames_transmitted: u64,
    pub frames_dropped: u64,
    /// Total bits put on the wire
    pub bits_transmitted: f64,
    /// Timestamp of the last processed event, seconds
    pub duration_s: f64,
    /// Idle slope the queue was shaped with, for efficiency reduction
    pub idle_slope_bps: f64,
}

/// Everything needed to replay one queue.
#[derive(Debug, Clone)]
pub struct QueueSetup {
    /// Derived CBS parameters for the traffic class
    pub params: CbsParameters,
    /// Link rate in bits per second
    pub link_rate_bps: f64,
    /// Credit behavior when the queue drains
    pub policy: CreditPolicy,
    /// Waiting frames beyond this depth are dropped; `None` is unbounded
    pub max_queue_depth: Option<usize>,
    /// Stop after this many frames (transmitted plus dropped); `None`
    /// replays the whole sequence
    pub max_frames: Option<usize>,
}

impl QueueSetup {
    /// Unbounded replay with the default reset-on-empty policy.
    pub fn new(params: CbsParameters, link_rate_bps: f64) -> Self {
        Self {
            params,
            link_rate_bps,
            policy: CreditPolicy::default(),
            max_queue_depth: None,
            max_frames: None,
        }
    }
}

/// Sequential credit-state simulator for one queue.
#[derive(Debug, Clone)]
pub struct CreditSimulator {
    setup: QueueSetup,
}

impl CreditSimulator {
    /// Validates the parameters and builds a simulator.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidParameters` - If the slopes or credit
    ///   bounds cannot drive a valid state machine (idle slope must be
    ///   positive, send slope negative, credit bounds straddling zero)
    pub fn new(setup: QueueSetup) -> Result<Self> {
        let p = &setup.params;
        let fail = |reason: String| Err(SimulationError::InvalidParameters { reason });

        if !(setup.link_rate_bps > 0.0) {
            return fail(format!("link rate {} bps not positive", setup.link_rate_bps));
        }
        if !(p.idle_slope_bps > 0.0) {
            return fail(format!("idle slope {} bps not positive", p.idle_slope_bps));
        }
        if p.send_slope_bps >= 0.0 {
            return fail(format!("send slope {} bps not negative", p.send_slope_bps));
        }
        if !(p.hi_credit_bits > 0.0) {
            return fail(format!("hi credit {} bits not positive", p.hi_credit_bits));
        }
        if p.lo_credit_bits >= 0.0 {
            return fail(format!("lo credit {} bits not negative", p.lo_credit_bits));
        }

        Ok(Self { setup })
    }

    /// The setup this simulator was built with.
    pub fn setup(&self) -> &QueueSetup {
        &self.setup
    }

    /// Replays the arrival sequence and produces the transmission schedule.
    ///
    /// Arrivals are sorted by timestamp first; ties keep input order.
    /// Credit stays within `[lo_credit, hi_credit]` at every event
    /// boundary; clamping is a normal transition.
    pub fn run(&self, mut frames: Vec<Frame>) -> SimulationResult {
        frames.sort_by(|a, b| a.arrival_s.total_cmp(&b.arrival_s));

        let params = &self.setup.params;
        let idle = params.idle_slope_bps;
        let send = params.send_slope_bps;
        let hi = params.hi_credit_bits;
        let lo = params.lo_credit_bits;
        let link = self.setup.link_rate_bps;
        let policy = self.setup.policy;

        let mut records: Vec<FrameRecord> = frames
            .iter()
            .map(|frame| FrameRecord {
                stream: frame.stream.clone(),
                arrival_s: frame.arrival_s,
                size_bytes: frame.size_bytes,
                start_s: None,
                end_s: None,
                latency_s: None,
                dropped: false,
            })
            .collect();

        let mut state = CreditState::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        let mut now = 0.0_f64;
        let mut next_arrival = 0;
        let mut processed = 0_usize;
        let mut transmitted = 0_u64;
        let mut dropped = 0_u64;
        let mut bits_transmitted = 0.0_f64;

        let admit = |index: usize,
                     queue: &mut VecDeque<usize>,
                     records: &mut Vec<FrameRecord>,
                     dropped: &mut u64,
                     processed: &mut usize| {
            if let Some(limit) = self.setup.max_queue_depth {
                if queue.len() >= limit {
                    records[index].dropped = true;
                    *dropped += 1;
                    *processed += 1;
                    return;
                }
            }
            queue.push_back(index);
        };

        loop {
            // Budget check only between events, never mid-event
            if let Some(budget) = self.setup.max_frames {
                if processed >= budget {
                    break;
                }
            }

            if queue.is_empty() {
                let Some(frame) = frames.get(next_arrival) else {
                    break;
                };
                // Empty period: credit is frozen at zero under ResetOnEmpty,
                // keeps accruing under StandardAccrual
                match policy {
                    CreditPolicy::ResetOnEmpty => state.advance(frame.arrival_s),
                    CreditPolicy::StandardAccrual => state.accrue(frame.arrival_s, idle, hi),
                }
                now = frame.arrival_s;
                admit(
                    next_arrival,
                    &mut queue,
                    &mut records,
                    &mut dropped,
                    &mut processed,
                );
                next_arrival += 1;
                continue;
            }

            let wait = state.time_to_eligibility_s(idle);
            if wait > ELIGIBILITY_SLACK_S {
                // Accrue until the credit reaches zero, admitting frames
                // that arrive in the meantime
                let ready = now + wait;
                while let Some(frame) = frames.get(next_arrival) {
                    if frame.arrival_s > ready {
                        break;
                    }
                    admit(
                        next_arrival,
                        &mut queue,
                        &mut records,
                        &mut dropped,
                        &mut processed,
                    );
                    next_arrival += 1;
                }
                state.set_mode(QueueMode::WaitingForCredit);
                state.accrue(ready, idle, hi);
                now = ready;
                continue;
            }

            // Head frame is eligible: put it on the wire
            let Some(index) = queue.pop_front() else {
                break;
            };
            let frame = &frames[index];
            let tx_end = now + frame.bits() / link;
            while let Some(pending) = frames.get(next_arrival) {
                if pending.arrival_s > tx_end {
                    break;
                }
                admit(
                    next_arrival,
                    &mut queue,
                    &mut records,
                    &mut dropped,
                    &mut processed,
                );
                next_arrival += 1;
            }

            state.set_mode(QueueMode::Transmitting);
            state.drain(tx_end, send, lo);

            let record = &mut records[index];
            record.start_s = Some(now);
            record.end_s = Some(tx_end);
            record.latency_s = Some(tx_end - record.arrival_s);

            transmitted += 1;
            processed += 1;
            bits_transmitted += frame.bits();
            now = tx_end;

            if queue.is_empty() {
                state.on_queue_empty(now, policy);
            } else {
                state.set_mode(QueueMode::WaitingForCredit);
            }
        }

        // Frames beyond a configured budget were never evaluated
        records.retain(|record| record.start_s.is_some() || record.dropped);

        debug!(
            stream = params.stream,
            transmitted, dropped, duration = now, "queue replay finished"
        );

        SimulationResult {
            records,
            frames_transmitted: transmitted,
            frames_dropped: dropped,
            bits_transmitted,
            duration_s: now,
            idle_slope_bps: idle,
        }
    }
}

/// Replays independent queues in parallel.
///
/// Each queue owns its credit state and frame stream, so this is the only
/// safe parallelism boundary; the per-queue loops stay sequential.
///
/// # Errors
///
/// - `SimulationError::InvalidParameters` - If any queue's parameters fail
///   the start-of-run check
pub fn simulate_queues(queues: Vec<(QueueSetup, Vec<Frame>)>) -> Result<Vec<SimulationResult>> {
    queues
        .into_par_iter()
        .map(|(setup, frames)| {
            let simulator = CreditSimulator::new(setup)?;
            Ok(simulator.run(frames))
        })
        .collect()
}
