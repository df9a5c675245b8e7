//! Windlass actuator trait
//!
//! The windlass motor is reversed by two relays, one per direction. Only one
//! of them may ever be energised; [`Direction`] is a single exclusive enum so
//! "both active" cannot be expressed at all.

/// Motion direction of the windlass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Neither relay energised
    #[default]
    Stopped,
    /// Paying chain out
    Lowering,
    /// Hauling chain in
    Raising,
}

impl Direction {
    /// Check if a relay is energised in this direction
    pub fn is_moving(&self) -> bool {
        !matches!(self, Direction::Stopped)
    }
}

/// Logical relay output state
///
/// Built only from a [`Direction`], so at most one output is ever set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelayOutputs {
    down: bool,
    up: bool,
}

impl RelayOutputs {
    /// Outputs for a direction
    pub const fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Stopped => Self {
                down: false,
                up: false,
            },
            Direction::Lowering => Self {
                down: true,
                up: false,
            },
            Direction::Raising => Self {
                down: false,
                up: true,
            },
        }
    }

    /// Logical state of the "down" (lowering) relay
    pub const fn down(&self) -> bool {
        self.down
    }

    /// Logical state of the "up" (raising) relay
    pub const fn up(&self) -> bool {
        self.up
    }

    /// Check if any relay is energised
    pub const fn any(&self) -> bool {
        self.down || self.up
    }
}

/// Errors that can occur when engaging the actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError {
    /// Opposite direction requested without an intervening stop
    InterlockViolation,
    /// Relays still inside the settle delay after a stop
    Settling,
}

/// Exclusive dual-direction actuator
///
/// Implementations are the sole writer of relay output state.
pub trait WindlassActuator {
    /// Energise the relay for `direction`
    ///
    /// Engaging the direction already engaged is a no-op. Engaging
    /// [`Direction::Stopped`] is equivalent to [`stop`](Self::stop).
    fn engage(&mut self, direction: Direction) -> Result<(), ActuatorError>;

    /// De-energise both relays
    ///
    /// Idempotent and infallible.
    fn stop(&mut self);

    /// Currently engaged direction
    fn direction(&self) -> Direction;

    /// Advance internal timers by `delta_ms`
    fn update(&mut self, delta_ms: u32);

    /// Check if a new direction could be engaged right now
    fn can_engage(&self) -> bool;

    /// Current relay outputs
    fn outputs(&self) -> RelayOutputs {
        RelayOutputs::from_direction(self.direction())
    }
}
