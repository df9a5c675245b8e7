//! Latest-value sensor slots
//!
//! Each slot holds one `f32` as raw bits in an atomic, so a writer in an
//! interrupt or another task never blocks and never tears a value. A
//! reserved NaN pattern marks a slot with nothing new in it; every other NaN
//! (and infinity) reads back as [`Reading::Invalid`].
//!
//! The tick loop [`take`](SensorSlots::take)s the slots, so each write is
//! seen exactly once. Last-known values are kept by `Environment`, not here.

use portable_atomic::{AtomicU32, Ordering};

/// Bit pattern of a never-written slot (a NaN no arithmetic produces)
const EMPTY: u32 = 0x7FA0_0EE7;

/// Canonical NaN stored for any incoming NaN
const CANONICAL_NAN: u32 = 0x7FC0_0000;

/// What a slot currently holds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    /// Nothing written since the last take
    Missing,
    /// Last write was NaN or infinite
    Invalid,
    /// Last write was a finite value
    Value(f32),
}

/// Single-field latest-value slot
#[derive(Debug)]
pub struct SensorSlot {
    bits: AtomicU32,
}

impl Default for SensorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSlot {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(EMPTY),
        }
    }

    /// Store a value
    pub fn write(&self, value: f32) {
        let bits = if value.is_nan() {
            CANONICAL_NAN
        } else {
            value.to_bits()
        };
        self.bits.store(bits, Ordering::Relaxed);
    }

    /// Forget the value
    pub fn clear(&self) {
        self.bits.store(EMPTY, Ordering::Relaxed);
    }

    /// Read the current value without consuming it
    pub fn read(&self) -> Reading {
        decode(self.bits.load(Ordering::Relaxed))
    }

    /// Read and empty the slot
    pub fn take(&self) -> Reading {
        decode(self.bits.swap(EMPTY, Ordering::Relaxed))
    }
}

fn decode(bits: u32) -> Reading {
    if bits == EMPTY {
        return Reading::Missing;
    }
    let value = f32::from_bits(bits);
    if value.is_finite() {
        Reading::Value(value)
    } else {
        Reading::Invalid
    }
}

/// All inbound sensor slots
///
/// Can live in a `static`; writers only need `&self`.
#[derive(Debug, Default)]
pub struct SensorSlots {
    /// Water depth (m)
    pub depth: SensorSlot,
    /// Distance from bow to anchor (m)
    pub distance: SensorSlot,
    /// Wind speed (m/s)
    pub wind_speed: SensorSlot,
    /// Current tide height (m)
    pub tide_now: SensorSlot,
    /// High water tide height (m)
    pub tide_high: SensorSlot,
}

/// One take of every slot
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSnapshot {
    pub depth: Reading,
    pub distance: Reading,
    pub wind: Reading,
    pub tide_now: Reading,
    pub tide_high: Reading,
}

impl SensorSlots {
    /// Create empty slots
    pub const fn new() -> Self {
        Self {
            depth: SensorSlot::new(),
            distance: SensorSlot::new(),
            wind_speed: SensorSlot::new(),
            tide_now: SensorSlot::new(),
            tide_high: SensorSlot::new(),
        }
    }

    /// Take every slot, leaving them empty
    pub fn take(&self) -> SensorSnapshot {
        SensorSnapshot {
            depth: self.depth.take(),
            distance: self.distance.take(),
            wind: self.wind_speed.take(),
            tide_now: self.tide_now.take(),
            tide_high: self.tide_high.take(),
        }
    }
}
