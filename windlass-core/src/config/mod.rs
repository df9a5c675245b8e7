//! Configuration types
//!
//! Runtime tunables (`WindlassConfig`) and the records persisted to flash.

pub mod calibration;
#[cfg(feature = "toml")]
pub mod loader;
pub mod types;

pub use calibration::*;
#[cfg(feature = "toml")]
pub use loader::from_toml;
pub use types::*;
