//! Dual-relay windlass actuator
//!
//! Drives a reversible windlass motor through two relays (up and down).
//! The actuator owns the logical relay state; a board driver copies
//! [`outputs`](WindlassActuator::outputs) onto the pins after every call.
//!
//! # Interlock
//!
//! - Engaging the opposite direction without a stop in between is refused
//!   with [`ActuatorError::InterlockViolation`]
//! - After a stop, engaging is refused with [`ActuatorError::Settling`]
//!   until the settle delay has elapsed (relay contacts and motor inertia)
//!
//! ```ignore
//! let mut relay = RelayActuator::new(RelayConfig::default());
//! relay.engage(Direction::Lowering)?;
//!
//! // Every tick:
//! relay.update(delta_ms);
//! pins.apply(relay.outputs());
//! ```

use crate::config::RelayConfig;
use crate::traits::{ActuatorError, Direction, WindlassActuator};

/// Relay actuator with interlock and settle delay
#[derive(Debug, Clone)]
pub struct RelayActuator {
    config: RelayConfig,
    /// Currently engaged direction
    direction: Direction,
    /// Time since the last stop (ms)
    time_since_stop_ms: u32,
    /// Number of relay state changes (engage or stop)
    switch_count: u32,
}

impl RelayActuator {
    /// Create a new actuator with both relays released
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            direction: Direction::Stopped,
            time_since_stop_ms: u32::MAX, // Allow immediate first engage
            switch_count: 0,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Number of relay state changes since creation
    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    /// Remaining settle time before an engage is allowed (ms)
    pub fn settle_remaining_ms(&self) -> u32 {
        self.config.settle_ms.saturating_sub(self.time_since_stop_ms)
    }
}

impl WindlassActuator for RelayActuator {
    fn engage(&mut self, direction: Direction) -> Result<(), ActuatorError> {
        if direction == Direction::Stopped {
            self.stop();
            return Ok(());
        }

        if self.direction == direction {
            return Ok(());
        }

        if self.direction.is_moving() {
            log_error!(
                "Relay: interlock, {:?} requested while {:?} engaged",
                direction,
                self.direction
            );
            return Err(ActuatorError::InterlockViolation);
        }

        if self.time_since_stop_ms < self.config.settle_ms {
            return Err(ActuatorError::Settling);
        }

        self.direction = direction;
        self.switch_count += 1;
        log_debug!("Relay: engaged {:?}", direction);
        Ok(())
    }

    fn stop(&mut self) {
        if self.direction.is_moving() {
            log_debug!("Relay: released {:?}", self.direction);
            self.direction = Direction::Stopped;
            self.time_since_stop_ms = 0;
            self.switch_count += 1;
        }
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn update(&mut self, delta_ms: u32) {
        self.time_since_stop_ms = self.time_since_stop_ms.saturating_add(delta_ms);
    }

    fn can_engage(&self) -> bool {
        !self.direction.is_moving() && self.time_since_stop_ms >= self.config.settle_ms
    }
}
