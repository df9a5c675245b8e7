//! Loading and saving persisted records
//!
//! Records are postcard-encoded and sealed with a CRC (see
//! [`crate::config::calibration`]). Anything that fails to decode or verify
//! is reported as an error; callers fall back to defaults.

use crate::config::{PositionRecord, SpeedCalibration, SpeedRecord};
use crate::traits::{PersistentStore, StorageError, StorageKey};

/// Scratch buffer size for encoding and decoding records
const RECORD_BUF_LEN: usize = 32;

/// Errors while loading or saving a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    /// Storage backend failed
    Storage(StorageError),
    /// Record could not be encoded
    Encode,
    /// Stored bytes could not be decoded
    Decode,
    /// Record decoded but magic, version or CRC was wrong
    Corrupt,
}

impl From<StorageError> for PersistError {
    fn from(e: StorageError) -> Self {
        PersistError::Storage(e)
    }
}

/// Load the persisted chain length
pub fn load_position<S: PersistentStore>(store: &mut S) -> Result<f32, PersistError> {
    let mut buf = [0u8; RECORD_BUF_LEN];
    let len = store.read(StorageKey::ChainPosition, &mut buf)?;
    let record: PositionRecord =
        postcard::from_bytes(&buf[..len]).map_err(|_| PersistError::Decode)?;

    if !record.is_valid() || !record.length_m.is_finite() {
        return Err(PersistError::Corrupt);
    }

    Ok(record.length_m)
}

/// Save the chain length
pub fn save_position<S: PersistentStore>(store: &mut S, length_m: f32) -> Result<(), PersistError> {
    let record = PositionRecord::new(length_m);
    let mut buf = [0u8; RECORD_BUF_LEN];
    let bytes = postcard::to_slice(&record, &mut buf).map_err(|_| PersistError::Encode)?;
    store.write(StorageKey::ChainPosition, bytes)?;
    Ok(())
}

/// Load the persisted speed calibration
pub fn load_speeds<S: PersistentStore>(store: &mut S) -> Result<SpeedCalibration, PersistError> {
    let mut buf = [0u8; RECORD_BUF_LEN];
    let len = store.read(StorageKey::SpeedCalibration, &mut buf)?;
    let record: SpeedRecord =
        postcard::from_bytes(&buf[..len]).map_err(|_| PersistError::Decode)?;

    if !record.is_valid() {
        return Err(PersistError::Corrupt);
    }

    Ok(record.calibration)
}

/// Save the speed calibration
pub fn save_speeds<S: PersistentStore>(
    store: &mut S,
    speeds: &SpeedCalibration,
) -> Result<(), PersistError> {
    let record = SpeedRecord::new(*speeds);
    let mut buf = [0u8; RECORD_BUF_LEN];
    let bytes = postcard::to_slice(&record, &mut buf).map_err(|_| PersistError::Encode)?;
    store.write(StorageKey::SpeedCalibration, bytes)?;
    Ok(())
}
