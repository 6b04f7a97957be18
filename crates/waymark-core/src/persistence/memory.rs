use std::cell::Cell;

use crate::error::StoreError;
use crate::models::{LatLon, MarkerRecord};

use super::{PersistenceGateway, StoredMarkers};

/// In-process store. Can be switched into an unavailable state to exercise
/// failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    markers: StoredMarkers,
    unavailable: bool,
    reads: Cell<usize>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markers(markers: StoredMarkers) -> Self {
        Self {
            markers,
            ..Self::default()
        }
    }

    /// While unavailable, every read and write fails.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub fn markers(&self) -> &StoredMarkers {
        &self.markers
    }

    /// Number of successful collection reads so far.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn read<R>(&self, f: impl FnOnce(&StoredMarkers) -> R) -> Result<R, StoreError> {
        self.check()?;
        self.reads.set(self.reads.get() + 1);
        Ok(f(&self.markers))
    }

    fn write<R>(&mut self, f: impl FnOnce(&mut StoredMarkers) -> R) -> Result<R, StoreError> {
        self.check()?;
        self.writes += 1;
        Ok(f(&mut self.markers))
    }
}

impl PersistenceGateway for MemoryStore {
    fn read_active(&self) -> Result<Vec<MarkerRecord>, StoreError> {
        self.read(|m| m.active.clone())
    }

    fn read_history(&self) -> Result<Vec<MarkerRecord>, StoreError> {
        self.read(|m| m.history_records())
    }

    fn insert_active(
        &mut self,
        ordinal: usize,
        records: Vec<MarkerRecord>,
    ) -> Result<(), StoreError> {
        self.write(|m| m.insert_active(ordinal, records))
    }

    fn insert_history(&mut self, record: MarkerRecord) -> Result<(), StoreError> {
        self.write(|m| m.insert_history(record))
    }

    fn delete_active(&mut self, ordinal: usize) -> Result<bool, StoreError> {
        self.write(|m| m.delete_active(ordinal))
    }

    fn delete_history(&mut self, ordinal: usize) -> Result<bool, StoreError> {
        self.write(|m| m.delete_history(ordinal))
    }

    fn replace_active(&mut self, records: Vec<MarkerRecord>) -> Result<(), StoreError> {
        self.write(|m| m.active = records)
    }

    fn replace_history(&mut self, records: Vec<MarkerRecord>) -> Result<(), StoreError> {
        self.write(|m| m.replace_history(records))
    }

    fn replace_all(
        &mut self,
        active: Vec<MarkerRecord>,
        history: Vec<MarkerRecord>,
    ) -> Result<(), StoreError> {
        self.write(|m| {
            m.active = active;
            m.replace_history(history);
        })
    }

    fn update_active(&mut self, ordinal: usize, record: MarkerRecord) -> Result<bool, StoreError> {
        self.write(|m| m.update_active(ordinal, record))
    }

    fn update_history(
        &mut self,
        ordinal: usize,
        record: MarkerRecord,
    ) -> Result<bool, StoreError> {
        self.write(|m| m.update_history(ordinal, record))
    }

    fn move_active(&mut self, ordinal: usize, point: LatLon) -> Result<bool, StoreError> {
        self.write(|m| m.move_active(ordinal, point))
    }
}
