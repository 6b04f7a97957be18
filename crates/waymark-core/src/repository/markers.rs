use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::error::{MarkerResult, StoreError};
use crate::geocoding::{AddressResolver, GeocodingService};
use crate::models::{
    assign_colors, LatLon, Marker, MarkerList, MarkerRecord, PointDescription,
};
use crate::notifier::{ChangeNotifier, MarkerObserver};
use crate::persistence::PersistenceGateway;

/// Both marker lists as materialized by the last reload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerSnapshot {
    pub active: Vec<Marker>,
    pub history: Vec<Marker>,
}

/// Owner of the active and history marker lists.
///
/// Every mutation writes through the gateway and then reloads both lists
/// from it, so the in-memory lists always mirror the store. A failed write
/// returns `MarkerError::PersistenceUnavailable` and leaves the lists as
/// they were. Methods take `&mut self`; the repository is meant to live on
/// one owner context and receive geocoding results there.
pub struct MarkerRepository<G: PersistenceGateway> {
    pub(super) gateway: G,
    pub(super) active: Vec<Marker>,
    pub(super) history: Vec<Marker>,
    pub(super) notifier: ChangeNotifier,
    pub(super) resolver: AddressResolver,
}

/// Position of `marker` in `markers`: its recorded index if that still
/// holds the same record, otherwise the matching record nearest to it.
pub(super) fn locate(markers: &[Marker], marker: &Marker) -> Option<usize> {
    if let Some(candidate) = markers.get(marker.index) {
        if candidate.same_record(marker) {
            return Some(marker.index);
        }
    }
    markers
        .iter()
        .enumerate()
        .filter(|(_, m)| m.same_record(marker))
        .min_by_key(|(i, _)| i.abs_diff(marker.index))
        .map(|(i, _)| i)
}

fn materialize(records: Vec<MarkerRecord>, list: MarkerList) -> Vec<Marker> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| Marker::from_record(record, list, index))
        .collect()
}

fn records(markers: &[Marker]) -> Vec<MarkerRecord> {
    markers.iter().map(Marker::to_record).collect()
}

impl<G: PersistenceGateway> MarkerRepository<G> {
    /// Load both lists from `gateway`. No lookups are issued until
    /// `resolve_all` or the first mutation.
    pub fn open(gateway: G, geocoder: Arc<dyn GeocodingService>) -> MarkerResult<Self> {
        let mut repository = Self {
            gateway,
            active: Vec::new(),
            history: Vec::new(),
            notifier: ChangeNotifier::new(),
            resolver: AddressResolver::new(geocoder),
        };
        repository.load()?;
        info!(
            active = repository.active.len(),
            history = repository.history.len(),
            "Marker repository opened"
        );
        Ok(repository)
    }

    /// Rebuild both lists from the store and renumber them.
    pub fn load(&mut self) -> MarkerResult<MarkerSnapshot> {
        let (active, history) = self.read_lists()?;
        self.active = active;
        self.history = history;
        Ok(self.snapshot())
    }

    fn read_lists(&self) -> Result<(Vec<Marker>, Vec<Marker>), StoreError> {
        let active = materialize(self.gateway.read_active()?, MarkerList::Active);
        let history = materialize(self.gateway.read_history()?, MarkerList::History);
        Ok((active, history))
    }

    /// Reload after a successful write and line up outstanding lookups with
    /// the markers that still wait for an address.
    fn commit(&mut self) -> MarkerResult<()> {
        self.load()?;
        let pending: HashSet<LatLon> = self
            .active
            .iter()
            .chain(self.history.iter())
            .filter(|m| m.is_address_pending())
            .map(|m| m.point)
            .collect();
        self.resolver.track_pending(&pending);
        Ok(())
    }

    fn commit_structural(&mut self) -> MarkerResult<()> {
        self.commit()?;
        self.notifier.notify_collection_changed();
        Ok(())
    }

    // ===== Adding =====

    /// Append a batch of markers to the active list.
    ///
    /// Colors continue the palette from the last active marker. Points
    /// without a label (or with an empty location label) wait for reverse
    /// geocoding. Returns the number of markers added; an empty batch is a
    /// no-op.
    pub fn add_markers<I>(&mut self, markers: I) -> MarkerResult<usize>
    where
        I: IntoIterator<Item = (LatLon, Option<PointDescription>)>,
    {
        let batch: Vec<(LatLon, Option<PointDescription>)> = markers.into_iter().collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let seed = self.active.last().map(|m| m.color);
        let colors = assign_colors(seed, batch.len());
        // Offset each record by its batch position so creation times stay
        // unique within the batch.
        let created_at = Utc::now();
        let new_records: Vec<MarkerRecord> = batch
            .into_iter()
            .zip(colors)
            .enumerate()
            .map(|(offset, ((point, label), color))| {
                let description = match label {
                    Some(label) if !(label.is_location() && label.name.is_empty()) => label,
                    _ => PointDescription::location(""),
                };
                MarkerRecord {
                    point,
                    description,
                    color,
                    selected: false,
                    created_at: created_at + Duration::nanoseconds(offset as i64),
                }
            })
            .collect();

        let count = new_records.len();
        self.gateway.insert_active(self.active.len(), new_records)?;
        self.commit_structural()?;
        info!(count, "Markers added");
        Ok(count)
    }

    pub fn add_marker(
        &mut self,
        point: LatLon,
        label: Option<PointDescription>,
    ) -> MarkerResult<usize> {
        self.add_markers([(point, label)])
    }

    /// Insert a marker snapshot into the active list at `ordinal`, keeping
    /// its color, label and creation time. Used to undo a removal.
    pub fn insert_marker(&mut self, marker: &Marker, ordinal: usize) -> MarkerResult<()> {
        self.gateway.insert_active(ordinal, vec![marker.to_record()])?;
        self.commit_structural()
    }

    // ===== Removing =====

    /// Delete one active marker. Returns false if it is no longer present.
    pub fn remove_active(&mut self, marker: &Marker) -> MarkerResult<bool> {
        let Some(ordinal) = locate(&self.active, marker) else {
            debug!(point = %marker.point, "Active marker already gone");
            return Ok(false);
        };
        let removed = self.gateway.delete_active(ordinal)?;
        self.resolver.cancel(marker.point);
        self.commit_structural()?;
        Ok(removed)
    }

    /// Delete one history marker. Returns false if it is no longer present.
    pub fn remove_history(&mut self, marker: &Marker) -> MarkerResult<bool> {
        let Some(ordinal) = locate(&self.history, marker) else {
            debug!(point = %marker.point, "History marker already gone");
            return Ok(false);
        };
        let removed = self.gateway.delete_history(ordinal)?;
        self.resolver.cancel(marker.point);
        self.commit_structural()?;
        Ok(removed)
    }

    /// Delete a marker from whichever list it came from.
    pub fn remove(&mut self, marker: &Marker) -> MarkerResult<bool> {
        match marker.list() {
            MarkerList::Active => self.remove_active(marker),
            MarkerList::History => self.remove_history(marker),
        }
    }

    // ===== Moving between lists =====

    /// Move every active marker to the head of history, in active order,
    /// unselected.
    pub fn clear_active(&mut self) -> MarkerResult<()> {
        if self.active.is_empty() {
            return Ok(());
        }
        let mut history = records(&self.active);
        for record in &mut history {
            record.selected = false;
        }
        history.extend(records(&self.history));

        self.gateway.replace_all(Vec::new(), history)?;
        self.resolver.cancel_all();
        let moved = self.active.len();
        self.commit_structural()?;
        info!(moved, "Active markers moved to history");
        Ok(())
    }

    pub fn clear_history(&mut self) -> MarkerResult<()> {
        self.gateway.replace_history(Vec::new())?;
        let points: Vec<LatLon> = self.history.iter().map(|m| m.point).collect();
        for point in points {
            self.resolver.cancel(point);
        }
        self.commit_structural()?;
        info!("Marker history cleared");
        Ok(())
    }

    /// Move one active marker to the head of history.
    pub fn archive_marker(&mut self, marker: &Marker) -> MarkerResult<bool> {
        let Some(ordinal) = locate(&self.active, marker) else {
            return Ok(false);
        };
        let mut active = records(&self.active);
        let mut archived = active.remove(ordinal);
        archived.selected = false;
        let mut history = Vec::with_capacity(self.history.len() + 1);
        history.push(archived);
        history.extend(records(&self.history));

        self.gateway.replace_all(active, history)?;
        self.commit_structural()?;
        Ok(true)
    }

    /// Bring a history marker back into the active list at `ordinal`.
    pub fn restore_marker(&mut self, marker: &Marker, ordinal: usize) -> MarkerResult<bool> {
        let Some(position) = locate(&self.history, marker) else {
            return Ok(false);
        };
        let mut history = records(&self.history);
        let restored = history.remove(position);
        let mut active = records(&self.active);
        let at = ordinal.min(active.len());
        active.insert(at, restored);

        self.gateway.replace_all(active, history)?;
        self.commit_structural()?;
        Ok(true)
    }

    // ===== Ordering =====

    pub fn reverse_active_order(&mut self) -> MarkerResult<()> {
        let mut reversed = records(&self.active);
        reversed.reverse();
        self.gateway.replace_active(reversed)?;
        self.resolver.cancel_all();
        self.commit_structural()
    }

    /// Persist caller-ordered lists. `None` keeps that list as stored.
    /// History entries that also appear in the resulting active list are
    /// dropped so no marker ends up in both.
    pub fn save_markers(
        &mut self,
        active: Option<&[Marker]>,
        history: Option<&[Marker]>,
    ) -> MarkerResult<()> {
        if active.is_none() && history.is_none() {
            return Ok(());
        }
        let active = active.unwrap_or(self.active.as_slice()).to_vec();
        let history: Vec<Marker> = history
            .unwrap_or(self.history.as_slice())
            .iter()
            .filter(|h| !active.iter().any(|a| a.same_record(h)))
            .cloned()
            .collect();

        self.gateway
            .replace_all(records(&active), records(&history))?;
        self.commit_structural()
    }

    // ===== In-place updates =====

    /// Move an active marker to a new coordinate, keeping everything else.
    pub fn move_marker(&mut self, marker: &Marker, point: LatLon) -> MarkerResult<bool> {
        if marker.is_history() {
            return Ok(false);
        }
        let Some(ordinal) = locate(&self.active, marker) else {
            return Ok(false);
        };
        let moved = self.gateway.move_active(ordinal, point)?;
        self.resolver.cancel(marker.point);
        self.commit_structural()?;
        Ok(moved)
    }

    /// Persist description, color and selection of `marker`. Its position
    /// stays as stored.
    pub fn update_marker(&mut self, marker: &Marker) -> MarkerResult<bool> {
        let list = marker.list();
        let Some(ordinal) = locate(self.list(list), marker) else {
            return Ok(false);
        };
        let updated = match list {
            MarkerList::Active => self.gateway.update_active(ordinal, marker.to_record())?,
            MarkerList::History => self.gateway.update_history(ordinal, marker.to_record())?,
        };
        self.commit()?;
        if let Some(current) = self.list(list).get(ordinal) {
            self.notifier.notify_marker_changed(current);
        }
        Ok(updated)
    }

    /// Select or deselect an active marker. History markers are ignored.
    pub fn select(&mut self, marker: &Marker, selected: bool) -> MarkerResult<bool> {
        let mut changed = marker.clone();
        if !changed.set_selected(selected) {
            return Ok(false);
        }
        self.update_marker(&changed)
    }

    // ===== Observers =====

    pub fn subscribe(&mut self, observer: Arc<dyn MarkerObserver>) -> bool {
        self.notifier.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, observer: &Arc<dyn MarkerObserver>) -> bool {
        self.notifier.unsubscribe(observer)
    }

    /// Tell observers the collection changed without touching it.
    pub fn refresh(&self) {
        self.notifier.notify_collection_changed();
    }

    // ===== Queries =====

    pub(super) fn list(&self, list: MarkerList) -> &[Marker] {
        match list {
            MarkerList::Active => &self.active,
            MarkerList::History => &self.history,
        }
    }

    pub fn snapshot(&self) -> MarkerSnapshot {
        MarkerSnapshot {
            active: self.active.clone(),
            history: self.history.clone(),
        }
    }

    pub fn active_markers(&self) -> Vec<Marker> {
        self.active.clone()
    }

    pub fn history_markers(&self) -> Vec<Marker> {
        self.history.clone()
    }

    pub fn first_active(&self) -> Option<Marker> {
        self.active.first().cloned()
    }

    pub fn selected_markers(&self) -> Vec<Marker> {
        self.active.iter().filter(|m| m.is_selected()).cloned().collect()
    }

    pub fn active_points(&self) -> Vec<LatLon> {
        self.active.iter().map(|m| m.point).collect()
    }

    pub fn selected_points(&self) -> Vec<LatLon> {
        self.active
            .iter()
            .filter(|m| m.is_selected())
            .map(|m| m.point)
            .collect()
    }

    pub fn history_points(&self) -> Vec<LatLon> {
        self.history.iter().map(|m| m.point).collect()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Direct access to the store. Changes made here show up after the
    /// next `load`.
    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }
}
