//! Windlass actuators
//!
//! Implementations of [`crate::traits::WindlassActuator`].

pub mod relay;

pub use relay::RelayActuator;
