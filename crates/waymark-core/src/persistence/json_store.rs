use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;
use crate::models::{LatLon, MarkerRecord};

use super::{PersistenceGateway, StoredMarkers};

/// Default file name inside the data directory.
pub const MARKERS_FILE: &str = "markers.json";

/// Keeps both collections in one pretty-printed JSON document.
///
/// Every write reads the document, applies the change and replaces the file
/// through a temporary sibling and a rename, so readers never observe a
/// half-written file.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Store at `<dir>/markers.json`.
    pub fn in_dir(dir: &Path) -> Result<Self, StoreError> {
        Self::new(dir.join(MARKERS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoredMarkers, StoreError> {
        if !self.path.exists() {
            return Ok(StoredMarkers::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(StoredMarkers::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, markers: &StoredMarkers) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(markers)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(
            path = %self.path.display(),
            active = markers.active.len(),
            history = markers.history.len(),
            "Marker store written"
        );
        Ok(())
    }

    fn modify<R>(&mut self, f: impl FnOnce(&mut StoredMarkers) -> R) -> Result<R, StoreError> {
        let mut markers = self.load()?;
        let result = f(&mut markers);
        self.save(&markers)?;
        Ok(result)
    }
}

impl PersistenceGateway for JsonStore {
    fn read_active(&self) -> Result<Vec<MarkerRecord>, StoreError> {
        Ok(self.load()?.active)
    }

    fn read_history(&self) -> Result<Vec<MarkerRecord>, StoreError> {
        Ok(self.load()?.history_records())
    }

    fn insert_active(
        &mut self,
        ordinal: usize,
        records: Vec<MarkerRecord>,
    ) -> Result<(), StoreError> {
        self.modify(|m| m.insert_active(ordinal, records))
    }

    fn insert_history(&mut self, record: MarkerRecord) -> Result<(), StoreError> {
        self.modify(|m| m.insert_history(record))
    }

    fn delete_active(&mut self, ordinal: usize) -> Result<bool, StoreError> {
        self.modify(|m| m.delete_active(ordinal))
    }

    fn delete_history(&mut self, ordinal: usize) -> Result<bool, StoreError> {
        self.modify(|m| m.delete_history(ordinal))
    }

    fn replace_active(&mut self, records: Vec<MarkerRecord>) -> Result<(), StoreError> {
        self.modify(|m| m.active = records)
    }

    fn replace_history(&mut self, records: Vec<MarkerRecord>) -> Result<(), StoreError> {
        self.modify(|m| m.replace_history(records))
    }

    fn replace_all(
        &mut self,
        active: Vec<MarkerRecord>,
        history: Vec<MarkerRecord>,
    ) -> Result<(), StoreError> {
        self.modify(|m| {
            m.active = active;
            m.replace_history(history);
        })
    }

    fn update_active(&mut self, ordinal: usize, record: MarkerRecord) -> Result<bool, StoreError> {
        self.modify(|m| m.update_active(ordinal, record))
    }

    fn update_history(
        &mut self,
        ordinal: usize,
        record: MarkerRecord,
    ) -> Result<bool, StoreError> {
        self.modify(|m| m.update_history(ordinal, record))
    }

    fn move_active(&mut self, ordinal: usize, point: LatLon) -> Result<bool, StoreError> {
        self.modify(|m| m.move_active(ordinal, point))
    }
}
