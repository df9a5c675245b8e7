//! Windlass command and telemetry protocol
//!
//! This crate defines the boundary vocabulary between the windlass core and
//! the outside world:
//!
//! - Inbound: a single string-valued command channel (`autoDrop`,
//!   `autoRetrieve`, `drop`, `raiseN`, `lowerN`, `reset`, `STOP`)
//! - Outbound: published values (rode deployed, chain slack, chain
//!   direction, deployment stage) and command/movement status codes
//!
//! Transport is out of scope. The paths follow the Signal K
//! `navigation.anchor.*` naming used by the boat network.

#![no_std]
#![deny(unsafe_code)]

pub mod command;
pub mod telemetry;

pub use command::{Command, ParseError, MAX_COMMAND_LEN};
pub use telemetry::{ChainDirection, StatusCode, Telemetry};
