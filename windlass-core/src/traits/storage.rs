//! Persistent storage trait
//!
//! Small key/value records that must survive a power cycle: the deployed
//! chain length and the speed calibration. Flash layout and wear levelling
//! belong to the implementation.

/// Keys for persisted records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Deployed chain length
    ChainPosition = 0,
    /// Per-direction speed calibration
    SpeedCalibration = 1,
}

impl StorageKey {
    /// Numeric key used by storage backends
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Storage backend errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No record stored under the key
    NotFound,
    /// Caller buffer too small for the stored record
    BufferTooSmall,
    /// Backend has no room left
    Full,
    /// Underlying device failed
    Backend,
}

/// Synchronous key/value store for persisted records
pub trait PersistentStore {
    /// Read the record under `key` into `buffer`, returning its length
    fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace the record under `key`
    fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StorageError>;
}
