use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{LatLon, MarkerRecord};

/// Durable storage for the two marker collections.
///
/// Every operation is a whole-value write addressed by ordinal position.
/// Records have no stable identifier, so an ordinal is only meaningful
/// against the state the caller last read.
pub trait PersistenceGateway {
    fn read_active(&self) -> Result<Vec<MarkerRecord>, StoreError>;

    /// History records never carry a selection flag.
    fn read_history(&self) -> Result<Vec<MarkerRecord>, StoreError>;

    /// Insert `records` in order starting at `ordinal` (clamped to the end).
    fn insert_active(&mut self, ordinal: usize, records: Vec<MarkerRecord>)
        -> Result<(), StoreError>;

    /// Insert one record at the head of history.
    fn insert_history(&mut self, record: MarkerRecord) -> Result<(), StoreError>;

    /// Returns false when nothing exists at `ordinal`.
    fn delete_active(&mut self, ordinal: usize) -> Result<bool, StoreError>;

    fn delete_history(&mut self, ordinal: usize) -> Result<bool, StoreError>;

    fn replace_active(&mut self, records: Vec<MarkerRecord>) -> Result<(), StoreError>;

    fn replace_history(&mut self, records: Vec<MarkerRecord>) -> Result<(), StoreError>;

    /// Replace both collections in a single write, so a marker moving
    /// between them is never stored twice or lost.
    fn replace_all(
        &mut self,
        active: Vec<MarkerRecord>,
        history: Vec<MarkerRecord>,
    ) -> Result<(), StoreError>;

    /// Overwrite description, color and selection of one active record.
    /// Position and creation time stay as stored.
    fn update_active(&mut self, ordinal: usize, record: MarkerRecord) -> Result<bool, StoreError>;

    fn update_history(&mut self, ordinal: usize, record: MarkerRecord)
        -> Result<bool, StoreError>;

    fn move_active(&mut self, ordinal: usize, point: LatLon) -> Result<bool, StoreError>;
}

/// Both collections as one value. Stores that keep everything in a single
/// document (or in memory) apply operations through this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredMarkers {
    #[serde(default)]
    pub active: Vec<MarkerRecord>,
    #[serde(default)]
    pub history: Vec<MarkerRecord>,
}

impl StoredMarkers {
    pub fn history_records(&self) -> Vec<MarkerRecord> {
        self.history
            .iter()
            .cloned()
            .map(|mut record| {
                record.selected = false;
                record
            })
            .collect()
    }

    pub fn insert_active(&mut self, ordinal: usize, records: Vec<MarkerRecord>) {
        let at = ordinal.min(self.active.len());
        self.active.splice(at..at, records);
    }

    pub fn insert_history(&mut self, mut record: MarkerRecord) {
        record.selected = false;
        self.history.insert(0, record);
    }

    pub fn delete_active(&mut self, ordinal: usize) -> bool {
        remove_at(&mut self.active, ordinal)
    }

    pub fn delete_history(&mut self, ordinal: usize) -> bool {
        remove_at(&mut self.history, ordinal)
    }

    pub fn replace_history(&mut self, records: Vec<MarkerRecord>) {
        self.history = records
            .into_iter()
            .map(|mut record| {
                record.selected = false;
                record
            })
            .collect();
    }

    pub fn update_active(&mut self, ordinal: usize, record: MarkerRecord) -> bool {
        update_at(&mut self.active, ordinal, record)
    }

    pub fn update_history(&mut self, ordinal: usize, mut record: MarkerRecord) -> bool {
        record.selected = false;
        update_at(&mut self.history, ordinal, record)
    }

    pub fn move_active(&mut self, ordinal: usize, point: LatLon) -> bool {
        match self.active.get_mut(ordinal) {
            Some(stored) => {
                stored.point = point;
                true
            }
            None => false,
        }
    }
}

fn remove_at(records: &mut Vec<MarkerRecord>, ordinal: usize) -> bool {
    if ordinal < records.len() {
        records.remove(ordinal);
        true
    } else {
        false
    }
}

fn update_at(records: &mut [MarkerRecord], ordinal: usize, record: MarkerRecord) -> bool {
    match records.get_mut(ordinal) {
        Some(stored) => {
            stored.description = record.description;
            stored.color = record.color;
            stored.selected = record.selected;
            true
        }
        None => false,
    }
}
