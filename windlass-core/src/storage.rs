//! In-memory persistent store
//!
//! Backs [`PersistentStore`] with fixed-capacity RAM buffers. Used on hosts
//! and in tests; the firmware provides a flash-backed implementation.

use heapless::Vec;

use crate::traits::{PersistentStore, StorageError, StorageKey};

/// Largest record accepted
pub const MAX_RECORD_LEN: usize = 64;

/// Number of distinct keys held
const MAX_KEYS: usize = 4;

/// RAM-backed key/value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<(StorageKey, Vec<u8, MAX_RECORD_LEN>), MAX_KEYS>,
    writes: u32,
}

impl MemoryStore {
    /// Create an empty store
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            writes: 0,
        }
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> u32 {
        self.writes
    }

    /// Check if a record exists under `key`
    pub fn contains(&self, key: StorageKey) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Overwrite the raw bytes of a record without counting a write
    ///
    /// Lets tests plant corrupt records.
    pub fn corrupt(&mut self, key: StorageKey, offset: usize) {
        if let Some((_, data)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            if let Some(byte) = data.get_mut(offset) {
                *byte ^= 0xFF;
            }
        }
    }
}

impl PersistentStore for MemoryStore {
    fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, StorageError> {
        let (_, data) = self
            .entries
            .iter()
            .find(|(k, _)| *k == key)
            .ok_or(StorageError::NotFound)?;

        let dest = buffer
            .get_mut(..data.len())
            .ok_or(StorageError::BufferTooSmall)?;
        dest.copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StorageError> {
        let bytes: Vec<u8, MAX_RECORD_LEN> =
            Vec::from_slice(data).map_err(|_| StorageError::Full)?;

        if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            *slot = bytes;
        } else {
            self.entries
                .push((key, bytes))
                .map_err(|_| StorageError::Full)?;
        }

        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key() {
        let mut store = MemoryStore::new();
        let mut buf = [0u8; 8];
        assert_eq!(
            store.read(StorageKey::ChainPosition, &mut buf),
            Err(StorageError::NotFound)
        );
    }

    #[test]
    fn test_write_then_overwrite() {
        let mut store = MemoryStore::new();
        store.write(StorageKey::ChainPosition, &[1, 2, 3]).unwrap();
        store.write(StorageKey::ChainPosition, &[4, 5]).unwrap();

        let mut buf = [0u8; 8];
        let len = store.read(StorageKey::ChainPosition, &mut buf).unwrap();
        assert_eq!(&buf[..len], &[4, 5]);
        assert_eq!(store.write_count(), 2);
        assert!(!store.contains(StorageKey::SpeedCalibration));
    }

    #[test]
    fn test_small_buffer() {
        let mut store = MemoryStore::new();
        store.write(StorageKey::SpeedCalibration, &[0; 10]).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(
            store.read(StorageKey::SpeedCalibration, &mut buf),
            Err(StorageError::BufferTooSmall)
        );
    }

    #[test]
    fn test_oversized_record() {
        let mut store = MemoryStore::new();
        assert_eq!(
            store.write(StorageKey::ChainPosition, &[0; MAX_RECORD_LEN + 1]),
            Err(StorageError::Full)
        );
    }
}
