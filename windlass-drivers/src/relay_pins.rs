//! Relay output pins
//!
//! Copies the actuator's logical [`RelayOutputs`] onto two GPIO pins. The
//! pins can be active-high (default) or active-low, as many relay boards
//! pull the coil in on a low input.
//!
//! Every change is break-before-make: the relay going off is written first,
//! and the other relay is only energised once that write succeeded.

use embedded_hal::digital::OutputPin;
use windlass_core::traits::{Direction, RelayOutputs};

/// Electrical level that energises a relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Relay on = pin high
    #[default]
    ActiveHigh,
    /// Relay on = pin low
    ActiveLow,
}

/// Pin write failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPinError<EU, ED> {
    /// Up relay pin
    Up(EU),
    /// Down relay pin
    Down(ED),
}

/// Up and down relay pins
pub struct RelayPins<U, D> {
    up: U,
    down: D,
    polarity: Polarity,
    /// Last state written successfully
    applied: RelayOutputs,
}

impl<U: OutputPin, D: OutputPin> RelayPins<U, D> {
    /// Take the pins and release both relays
    pub fn new(up: U, down: D, polarity: Polarity) -> Result<Self, RelayPinError<U::Error, D::Error>> {
        let mut pins = Self {
            up,
            down,
            polarity,
            applied: RelayOutputs::default(),
        };
        pins.release_all()?;
        Ok(pins)
    }

    /// Take active-high pins
    pub fn new_active_high(up: U, down: D) -> Result<Self, RelayPinError<U::Error, D::Error>> {
        Self::new(up, down, Polarity::ActiveHigh)
    }

    /// Take active-low pins
    pub fn new_active_low(up: U, down: D) -> Result<Self, RelayPinError<U::Error, D::Error>> {
        Self::new(up, down, Polarity::ActiveLow)
    }

    /// Get the polarity
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Last state written to the pins
    pub fn applied(&self) -> RelayOutputs {
        self.applied
    }

    /// Write `outputs` to the pins
    ///
    /// Nothing is written when the pins already show `outputs`.
    pub fn apply(&mut self, outputs: RelayOutputs) -> Result<(), RelayPinError<U::Error, D::Error>> {
        if outputs == self.applied {
            return Ok(());
        }

        // Break
        if !outputs.up() {
            write(&mut self.up, false, self.polarity).map_err(RelayPinError::Up)?;
        }
        if !outputs.down() {
            write(&mut self.down, false, self.polarity).map_err(RelayPinError::Down)?;
        }

        // Make
        if outputs.up() {
            write(&mut self.up, true, self.polarity).map_err(RelayPinError::Up)?;
        }
        if outputs.down() {
            write(&mut self.down, true, self.polarity).map_err(RelayPinError::Down)?;
        }

        self.applied = outputs;
        Ok(())
    }

    /// Release both relays unconditionally
    pub fn release_all(&mut self) -> Result<(), RelayPinError<U::Error, D::Error>> {
        let up = write(&mut self.up, false, self.polarity).map_err(RelayPinError::Up);
        let down = write(&mut self.down, false, self.polarity).map_err(RelayPinError::Down);
        up?;
        down?;
        self.applied = RelayOutputs::from_direction(Direction::Stopped);
        Ok(())
    }

    /// Give the pins back
    pub fn release(self) -> (U, D) {
        (self.up, self.down)
    }
}

fn write<P: OutputPin>(pin: &mut P, on: bool, polarity: Polarity) -> Result<(), P::Error> {
    let high = match polarity {
        Polarity::ActiveHigh => on,
        Polarity::ActiveLow => !on,
    };
    if high {
        pin.set_high()
    } else {
        pin.set_low()
    }
}
