//! Credit state evolution for one traffic class queue.
//!
//! The credit value is continuous between events and always clamped to
//! `[lo_credit, hi_credit]`; clamping is a normal transition, never an
//! error. State is owned by a single simulator loop and never shared.

use serde::{Deserialize, Serialize};

/// What the queue is doing at the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueMode {
    /// No frames queued
    Idle,
    /// Frames queued, credit still negative
    WaitingForCredit,
    /// A frame is on the wire
    Transmitting,
}

/// How credit behaves when the queue drains.
///
/// `ResetOnEmpty` zeroes credit whenever the queue transitions to
/// empty, a conservative simplification that never lets a queue bank
/// credit across idle periods. `StandardAccrual` follows IEEE 802.1Qav
/// more closely: credit keeps accruing at the idle slope while empty,
/// bounded by `hi_credit`, with no unconditional reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CreditPolicy {
    /// Zero the credit when the queue becomes empty (default)
    #[default]
    ResetOnEmpty,
    /// Keep accruing at the idle slope while empty, clamped at hi_credit
    StandardAccrual,
}

/// Mutable credit state for one queue.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditState {
    credit_bits: f64,
    mode: QueueMode,
    last_update_s: f64,
}

impl CreditState {
    /// Fresh state at simulation start: zero credit, idle queue.
    pub fn new() -> Self {
        Self {
            credit_bits: 0.0,
            mode: QueueMode::Idle,
            last_update_s: 0.0,
        }
    }

    /// Current credit in bits.
    pub fn credit_bits(&self) -> f64 {
        self.credit_bits
    }

    /// Current queue mode.
    pub fn mode(&self) -> QueueMode {
        self.mode
    }

    /// Timestamp of the last credit update, seconds.
    pub fn last_update_s(&self) -> f64 {
        self.last_update_s
    }

    pub(crate) fn set_mode(&mut self, mode: QueueMode) {
        self.mode = mode;
    }

    /// Moves the clock without changing the credit. Used for empty
    /// periods under [`CreditPolicy::ResetOnEmpty`], where the credit is
    /// pinned at zero.
    pub fn advance(&mut self, until_s: f64) {
        self.last_update_s = until_s;
    }

    /// Accrues credit at the idle slope until `until_s`, clamped at
    /// `hi_credit`. Used while waiting for credit and, under
    /// [`CreditPolicy::StandardAccrual`], while the queue is empty.
    pub fn accrue(&mut self, until_s: f64, idle_slope_bps: f64, hi_credit_bits: f64) {
        let dt = until_s - self.last_update_s;
        self.credit_bits = (self.credit_bits + idle_slope_bps * dt).min(hi_credit_bits);
        self.last_update_s = until_s;
    }

    /// Drains credit at the send slope until `until_s`, clamped at
    /// `lo_credit`.
    pub fn drain(&mut self, until_s: f64, send_slope_bps: f64, lo_credit_bits: f64) {
        let dt = until_s - self.last_update_s;
        self.credit_bits = (self.credit_bits + send_slope_bps * dt).max(lo_credit_bits);
        self.last_update_s = until_s;
    }

    /// Time until the credit reaches zero at the idle slope, seconds.
    /// Zero when the credit is already non-negative.
    pub fn time_to_eligibility_s(&self, idle_slope_bps: f64) -> f64 {
        if self.credit_bits >= 0.0 {
            0.0
        } else {
            -self.credit_bits / idle_slope_bps
        }
    }

    /// Applies the configured policy at the instant the queue drains.
    pub fn on_queue_empty(&mut self, at_s: f64, policy: CreditPolicy) {
        self.last_update_s = at_s;
        self.mode = QueueMode::Idle;
        if policy == CreditPolicy::ResetOnEmpty {
            self.credit_bits = 0.0;
        }
    }
}

impl Default for CreditState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accrual_clamps_at_hi_credit() {
        let mut state = CreditState::new();
        state.accrue(10.0, 100_000_000.0, 1500.0);

        assert_eq!(state.credit_bits(), 1500.0);
        assert_eq!(state.last_update_s(), 10.0);
    }

    #[test]
    fn test_drain_clamps_at_lo_credit() {
        let mut state = CreditState::new();
        state.drain(1.0, -900_000_000.0, -12_000.0);

        assert_eq!(state.credit_bits(), -12_000.0);
    }

    #[test]
    fn test_eligibility_time_from_negative_credit() {
        let mut state = CreditState::new();
        state.drain(0.0001, -100_000_000.0, -100_000.0);
        assert_eq!(state.credit_bits(), -10_000.0);

        // 10,000 bits deficit at 100 Mbps idle slope
        let wait = state.time_to_eligibility_s(100_000_000.0);
        assert!((wait - 0.0001).abs() < 1e-12);

        state.accrue(0.0001 + wait, 100_000_000.0, 1500.0);
        assert!(state.credit_bits().abs() < 1e-9);
    }

    #[test]
    fn test_eligibility_immediate_with_nonnegative_credit() {
        let state = CreditState::new();
        assert_eq!(state.time_to_eligibility_s(100_000_000.0), 0.0);
    }

    #[test]
    fn test_reset_on_empty_zeroes_credit() {
        let mut state = CreditState::new();
        state.drain(0.001, -900_000_000.0, -1_000_000.0);
        assert!(state.credit_bits() < 0.0);

        state.on_queue_empty(0.001, CreditPolicy::ResetOnEmpty);
        assert_eq!(state.credit_bits(), 0.0);
        assert_eq!(state.mode(), QueueMode::Idle);
    }

    #[test]
    fn test_standard_accrual_keeps_credit_on_empty() {
        let mut state = CreditState::new();
        state.drain(0.001, -900_000_000.0, -1_000_000.0);
        let before = state.credit_bits();

        state.on_queue_empty(0.001, CreditPolicy::StandardAccrual);
        assert_eq!(state.credit_bits(), before);
    }
}
