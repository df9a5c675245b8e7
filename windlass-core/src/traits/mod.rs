//! Hardware abstraction traits
//!
//! These traits define the interface between the control logic and the
//! things it drives or persists to.

pub mod actuator;
pub mod storage;

pub use actuator::{ActuatorError, Direction, RelayOutputs, WindlassActuator};
pub use storage::{PersistentStore, StorageError, StorageKey};
