//! Chain position tracker
//!
//! Each gypsy pulse moves `metres_per_pulse` of chain. The direction of the
//! pulse is taken from the relay state at the time it arrives. After the
//! relays release, the gypsy coasts on for a moment, so for `coast_ms`
//! pulses keep the last driven direction. Past that, both relays released
//! means free fall and pulses count as chain going out.

use crate::config::{ChainConfig, PersistenceConfig};
use crate::persist::{self, PersistError};
use crate::traits::{Direction, PersistentStore};

/// Deployed chain length with save policy
#[derive(Debug, Clone)]
pub struct PositionTracker {
    chain: ChainConfig,
    policy: PersistenceConfig,
    /// Current deployed length (m)
    length_m: f32,
    /// Length at the last successful save (m)
    saved_length_m: f32,
    /// Timestamp of the last successful save (ms)
    saved_at_ms: u32,
    /// Last driven direction and when its relay released
    coasting: Option<(Direction, u32)>,
}

impl PositionTracker {
    /// Create a tracker starting at `initial_m` (clamped to bounds)
    ///
    /// The initial value counts as saved at `now_ms`.
    pub fn new(chain: ChainConfig, policy: PersistenceConfig, initial_m: f32, now_ms: u32) -> Self {
        let length_m = if initial_m.is_finite() {
            chain.clamp(initial_m)
        } else {
            chain.min_length_m
        };

        Self {
            chain,
            policy,
            length_m,
            saved_length_m: length_m,
            saved_at_ms: now_ms,
            coasting: None,
        }
    }

    /// Current deployed length (m)
    pub fn get(&self) -> f32 {
        self.length_m
    }

    /// Chain geometry
    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// Recalibrate to an absolute length (clamped to bounds)
    pub fn set(&mut self, length_m: f32) {
        if !length_m.is_finite() {
            log_warn!("Position: ignoring non-finite recalibration");
            return;
        }
        self.length_m = self.chain.clamp(length_m);
        log_info!("Position: recalibrated to {} m", self.length_m);
    }

    /// Note that the relays released after driving `direction`
    pub fn released(&mut self, direction: Direction, now_ms: u32) {
        if direction.is_moving() {
            self.coasting = Some((direction, now_ms));
        }
    }

    /// Direction a pulse arriving now counts in, given what the relays drive
    pub fn pulse_direction(&self, driving: Direction, now_ms: u32) -> Direction {
        if driving.is_moving() {
            return driving;
        }
        match self.coasting {
            Some((direction, since)) if now_ms.wrapping_sub(since) < self.chain.coast_ms => {
                direction
            }
            _ => Direction::Stopped,
        }
    }

    /// Account for one counter pulse
    ///
    /// Returns the new length.
    pub fn on_pulse(&mut self, direction: Direction) -> f32 {
        let step = self.chain.metres_per_pulse;
        let next = match direction {
            Direction::Raising => self.length_m - step,
            Direction::Lowering | Direction::Stopped => self.length_m + step,
        };
        self.length_m = self.chain.clamp(next);
        self.length_m
    }

    /// Check if the save policy calls for a write
    ///
    /// Both the distance and the interval threshold must be met.
    pub fn should_save(&self, now_ms: u32) -> bool {
        let moved = (self.length_m - self.saved_length_m).abs();
        let elapsed = now_ms.wrapping_sub(self.saved_at_ms);
        moved >= self.policy.min_distance_m && elapsed >= self.policy.min_interval_ms
    }

    /// Save if the policy allows it
    ///
    /// Returns whether a write happened.
    pub fn maybe_save<S: PersistentStore>(
        &mut self,
        now_ms: u32,
        store: &mut S,
    ) -> Result<bool, PersistError> {
        if !self.should_save(now_ms) {
            return Ok(false);
        }
        self.force_save(now_ms, store)?;
        Ok(true)
    }

    /// Save unconditionally
    pub fn force_save<S: PersistentStore>(
        &mut self,
        now_ms: u32,
        store: &mut S,
    ) -> Result<(), PersistError> {
        persist::save_position(store, self.length_m)?;
        self.saved_length_m = self.length_m;
        self.saved_at_ms = now_ms;
        log_debug!("Position: saved {} m", self.length_m);
        Ok(())
    }

    /// Length at the last successful save (m)
    pub fn saved_length(&self) -> f32 {
        self.saved_length_m
    }
}
