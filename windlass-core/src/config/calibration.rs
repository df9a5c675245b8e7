//! Persisted calibration records
//!
//! Chain length and the per-direction speed estimates survive power cycles.
//! Each record carries a magic number, a format version and a CRC32 so a
//! half-written or foreign flash page is never mistaken for real data.

use serde::{Deserialize, Serialize};

use super::types::MotionConfig;
use crate::traits::Direction;

/// Magic number identifying a chain position record
pub const POSITION_MAGIC: u32 = 0x43484E4C; // "CHNL"

/// Magic number identifying a speed calibration record
pub const SPEED_MAGIC: u32 = 0x53504544; // "SPED"

/// Current record format version
pub const RECORD_VERSION: u8 = 1;

/// Per-direction windlass speed estimate (m/s)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedCalibration {
    /// Lowering speed (m/s)
    pub lowering_m_s: f32,
    /// Raising speed (m/s)
    pub raising_m_s: f32,
}

impl SpeedCalibration {
    /// Both directions at the same speed
    pub const fn uniform(speed_m_s: f32) -> Self {
        Self {
            lowering_m_s: speed_m_s,
            raising_m_s: speed_m_s,
        }
    }

    /// Speed estimate for a direction
    ///
    /// `Stopped` has no speed and returns 0.
    pub fn get(&self, direction: Direction) -> f32 {
        match direction {
            Direction::Stopped => 0.0,
            Direction::Lowering => self.lowering_m_s,
            Direction::Raising => self.raising_m_s,
        }
    }

    fn slot(&mut self, direction: Direction) -> Option<&mut f32> {
        match direction {
            Direction::Stopped => None,
            Direction::Lowering => Some(&mut self.lowering_m_s),
            Direction::Raising => Some(&mut self.raising_m_s),
        }
    }

    /// Blend a measured speed into the estimate (exponential average)
    ///
    /// Used when a movement reaches its target.
    pub fn smooth(&mut self, direction: Direction, measured_m_s: f32, config: &MotionConfig) {
        let measured = measured_m_s.clamp(config.min_speed_m_s, config.max_speed_m_s);
        let alpha = config.speed_smoothing;
        if let Some(speed) = self.slot(direction) {
            *speed = alpha * measured + (1.0 - alpha) * *speed;
        }
    }

    /// Replace the estimate with a measured speed
    ///
    /// Used when a movement times out: the old estimate was demonstrably
    /// wrong, so it is not averaged in.
    pub fn replace(&mut self, direction: Direction, measured_m_s: f32, config: &MotionConfig) {
        let measured = measured_m_s.clamp(config.min_speed_m_s, config.max_speed_m_s);
        if let Some(speed) = self.slot(direction) {
            *speed = measured;
        }
    }

    /// Check both estimates are usable
    pub fn is_plausible(&self, config: &MotionConfig) -> bool {
        let ok = |v: f32| v >= config.min_speed_m_s && v <= config.max_speed_m_s;
        ok(self.lowering_m_s) && ok(self.raising_m_s)
    }
}

/// Chain position record stored in flash
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionRecord {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Deployed chain length (m)
    pub length_m: f32,
    /// CRC32 over magic, version and payload
    pub crc: u32,
}

impl PositionRecord {
    /// Create a sealed record
    pub fn new(length_m: f32) -> Self {
        let mut record = Self {
            magic: POSITION_MAGIC,
            version: RECORD_VERSION,
            length_m,
            crc: 0,
        };
        record.crc = record.calculate_crc();
        record
    }

    /// Calculate CRC32 for the record (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFFFFFF;
        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);
        crc = crc32_update(crc, &self.length_m.to_le_bytes());
        !crc
    }

    /// Check magic, version and CRC
    pub fn is_valid(&self) -> bool {
        self.magic == POSITION_MAGIC
            && self.version == RECORD_VERSION
            && self.crc == self.calculate_crc()
    }
}

/// Speed calibration record stored in flash
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedRecord {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Speed estimates
    pub calibration: SpeedCalibration,
    /// CRC32 over magic, version and payload
    pub crc: u32,
}

impl SpeedRecord {
    /// Create a sealed record
    pub fn new(calibration: SpeedCalibration) -> Self {
        let mut record = Self {
            magic: SPEED_MAGIC,
            version: RECORD_VERSION,
            calibration,
            crc: 0,
        };
        record.crc = record.calculate_crc();
        record
    }

    /// Calculate CRC32 for the record (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFFFFFF;
        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);
        crc = crc32_update(crc, &self.calibration.lowering_m_s.to_le_bytes());
        crc = crc32_update(crc, &self.calibration.raising_m_s.to_le_bytes());
        !crc
    }

    /// Check magic, version and CRC
    pub fn is_valid(&self) -> bool {
        self.magic == SPEED_MAGIC && self.version == RECORD_VERSION && self.crc == self.calculate_crc()
    }
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB88320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
