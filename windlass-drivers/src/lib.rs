//! Hardware driver implementations
//!
//! Adapters between `embedded-hal` pins and the windlass core:
//!
//! - Relay output pins (active-high or active-low, break-before-make)
//! - Debounced gypsy pulse input

#![no_std]
#![deny(unsafe_code)]

pub mod pulse;
pub mod relay_pins;

pub use pulse::{PulseInput, DEFAULT_DEBOUNCE_MS};
pub use relay_pins::{Polarity, RelayPinError, RelayPins};
