//! Board-agnostic core logic for the anchor windlass controller
//!
//! This crate contains all control logic that does not depend on specific
//! hardware:
//!
//! - Relay actuator with direction interlock and settle delay
//! - Chain position tracking and save policy
//! - Catenary-based slack estimation
//! - Chain controller (targets, timeouts, slack pause/resume)
//! - Staged deployment and retrieval sequencers
//! - Sensor latest-value slots and telemetry publishing
//! - Configuration and persisted records
//!
//! Everything is driven by the fast and slow ticks of [`Windlass`]; nothing
//! in here blocks.

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod log;

pub mod actuator;
pub mod config;
pub mod control;
pub mod deployment;
pub mod persist;
pub mod position;
pub mod retrieval;
pub mod sensors;
pub mod slack;
pub mod storage;
pub mod system;
pub mod telemetry;
pub mod traits;

pub use system::Windlass;
