//! Chain position
//!
//! Integrates gypsy counter pulses into a deployed chain length and decides
//! when that length is written back to storage.

pub mod tracker;

pub use tracker::PositionTracker;
