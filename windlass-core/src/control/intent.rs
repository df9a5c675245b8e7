//! Movement intent
//!
//! What the controller is trying to do right now. The intent outlives relay
//! pauses: while paused the relays are released but the target, start point
//! and timeout budget are kept, and paused time is not charged against the
//! timeout.

use crate::traits::Direction;

/// Why a movement is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PauseReason {
    /// Raising caught up with the chain (slack below threshold)
    Slack,
    /// Deployment sequencer holding for the boat to drift back
    DeploymentHold,
}

/// An active movement
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MovementIntent {
    /// Direction of travel (never `Stopped`)
    pub direction: Direction,
    /// Target chain length (m)
    pub target_m: f32,
    /// Chain length at start (m)
    pub start_m: f32,
    /// Start timestamp (ms)
    pub start_ms: u32,
    /// Budget of active (unpaused) time (ms)
    pub timeout_ms: u32,
    /// Paused by the raise slack hysteresis
    pub paused_for_slack: bool,
    /// Paused by the deployment sequencer
    pub held: bool,
    /// Last slack pause or resume transition (ms)
    pub last_pause_resume_ms: Option<u32>,
    paused_since_ms: Option<u32>,
    paused_total_ms: u32,
}

impl MovementIntent {
    /// Create a new running intent
    pub fn new(direction: Direction, start_m: f32, target_m: f32, start_ms: u32, timeout_ms: u32) -> Self {
        Self {
            direction,
            target_m,
            start_m,
            start_ms,
            timeout_ms,
            paused_for_slack: false,
            held: false,
            last_pause_resume_ms: None,
            paused_since_ms: None,
            paused_total_ms: 0,
        }
    }

    /// Check if the relays should be released
    pub fn is_paused(&self) -> bool {
        self.paused_for_slack || self.held
    }

    /// Check if `position_m` is at or past the target
    pub fn has_arrived(&self, position_m: f32, tolerance_m: f32) -> bool {
        match self.direction {
            Direction::Lowering => position_m >= self.target_m - tolerance_m,
            Direction::Raising => position_m <= self.target_m + tolerance_m,
            Direction::Stopped => true,
        }
    }

    /// Distance covered since start (m)
    pub fn covered(&self, position_m: f32) -> f32 {
        (position_m - self.start_m).abs()
    }

    /// Time spent moving, excluding pauses (ms)
    pub fn active_elapsed(&self, now_ms: u32) -> u32 {
        let total = now_ms.wrapping_sub(self.start_ms);
        let ongoing = self
            .paused_since_ms
            .map_or(0, |since| now_ms.wrapping_sub(since));
        total.saturating_sub(self.paused_total_ms.saturating_add(ongoing))
    }

    /// Set a pause reason
    ///
    /// Returns false if that reason was already set.
    pub fn pause(&mut self, reason: PauseReason, now_ms: u32) -> bool {
        let flag = self.flag(reason);
        if *flag {
            return false;
        }
        *flag = true;

        if reason == PauseReason::Slack {
            self.last_pause_resume_ms = Some(now_ms);
        }
        if self.paused_since_ms.is_none() {
            self.paused_since_ms = Some(now_ms);
        }
        true
    }

    /// Clear a pause reason
    ///
    /// Returns false if that reason was not set.
    pub fn resume(&mut self, reason: PauseReason, now_ms: u32) -> bool {
        let flag = self.flag(reason);
        if !*flag {
            return false;
        }
        *flag = false;

        if reason == PauseReason::Slack {
            self.last_pause_resume_ms = Some(now_ms);
        }
        if !self.is_paused() {
            if let Some(since) = self.paused_since_ms.take() {
                self.paused_total_ms = self
                    .paused_total_ms
                    .saturating_add(now_ms.wrapping_sub(since));
            }
        }
        true
    }

    /// Time since the last slack pause/resume transition (ms)
    pub fn since_pause_resume(&self, now_ms: u32) -> u32 {
        self.last_pause_resume_ms
            .map_or(u32::MAX, |t| now_ms.wrapping_sub(t))
    }

    fn flag(&mut self, reason: PauseReason) -> &mut bool {
        match reason {
            PauseReason::Slack => &mut self.paused_for_slack,
            PauseReason::DeploymentHold => &mut self.held,
        }
    }
}
