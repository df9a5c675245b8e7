//! Chain movement control
//!
//! [`ChainController`] drives the actuator toward a target chain length,
//! owns the movement timeout and pauses raising when the chain has no
//! slack left to haul.

pub mod controller;
pub mod intent;

pub use controller::{ChainController, ControlInputs, ControllerEvent, ControllerState};
pub use intent::{MovementIntent, PauseReason};

use windlass_protocol::ParseError;

/// Errors returned when a command cannot be started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// A movement or sequence is already running
    AlreadyActive,
    /// Amount not finite or not positive
    InvalidAmount,
    /// Chain already at the limit in that direction
    AtLimit,
    /// Depth missing or outside the auto-deployment window
    InvalidDepth,
    /// Actuator fault (latched until STOP)
    Fault,
    /// Command string not understood
    Parse(ParseError),
}

impl From<ParseError> for CommandError {
    fn from(e: ParseError) -> Self {
        CommandError::Parse(e)
    }
}
