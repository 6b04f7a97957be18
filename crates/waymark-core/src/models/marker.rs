use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LatLon, MarkerColor, PointDescription};

/// Which of the two marker collections something belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerList {
    Active,
    History,
}

impl std::fmt::Display for MarkerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerList::Active => write!(f, "active"),
            MarkerList::History => write!(f, "history"),
        }
    }
}

/// Lifecycle state of a marker. Selection only exists for active markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Active { selected: bool },
    History,
}

/// A saved map point as materialized from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub point: LatLon,
    pub description: PointDescription,
    pub color: MarkerColor,
    pub created_at: DateTime<Utc>,
    /// Position within the owning list, rewritten on every reload.
    pub index: usize,
    state: MarkerState,
}

impl Marker {
    pub fn from_record(record: MarkerRecord, list: MarkerList, index: usize) -> Self {
        let state = match list {
            MarkerList::Active => MarkerState::Active {
                selected: record.selected,
            },
            MarkerList::History => MarkerState::History,
        };
        Self {
            point: record.point,
            description: record.description,
            color: record.color,
            created_at: record.created_at,
            index,
            state,
        }
    }

    /// Whole-value record for the store. History records never carry a
    /// selection.
    pub fn to_record(&self) -> MarkerRecord {
        MarkerRecord {
            point: self.point,
            description: self.description.clone(),
            color: self.color,
            selected: self.is_selected(),
            created_at: self.created_at,
        }
    }

    pub fn state(&self) -> MarkerState {
        self.state
    }

    pub fn list(&self) -> MarkerList {
        match self.state {
            MarkerState::Active { .. } => MarkerList::Active,
            MarkerState::History => MarkerList::History,
        }
    }

    pub fn is_history(&self) -> bool {
        self.state == MarkerState::History
    }

    pub fn is_selected(&self) -> bool {
        matches!(self.state, MarkerState::Active { selected: true })
    }

    /// Change the selection flag. Returns false for history markers, which
    /// cannot be selected.
    pub fn set_selected(&mut self, value: bool) -> bool {
        match &mut self.state {
            MarkerState::Active { selected } => {
                *selected = value;
                true
            }
            MarkerState::History => false,
        }
    }

    pub fn color_index(&self) -> usize {
        self.color.index()
    }

    pub fn is_address_pending(&self) -> bool {
        self.description.is_searching_address()
    }

    pub fn display_name(&self) -> &str {
        self.description.display_name()
    }

    /// Whether `other` describes the same stored record. Only the
    /// coordinate and creation time count; position, selection, color and
    /// label can all change through an update.
    pub fn same_record(&self, other: &Marker) -> bool {
        self.point == other.point && self.created_at == other.created_at
    }
}

/// One persisted marker. The store keys these by ordinal position only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub point: LatLon,
    pub description: PointDescription,
    pub color: MarkerColor,
    #[serde(default)]
    pub selected: bool,
    pub created_at: DateTime<Utc>,
}

impl MarkerRecord {
    pub fn new(point: LatLon, description: PointDescription, color: MarkerColor) -> Self {
        Self {
            point,
            description,
            color,
            selected: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MarkerRecord {
        let mut record = MarkerRecord::new(
            LatLon::new(10.0, 10.0),
            PointDescription::named("Ridge"),
            MarkerColor::Green,
        );
        record.selected = true;
        record
    }

    #[test]
    fn test_history_marker_drops_selection() {
        let marker = Marker::from_record(record(), MarkerList::History, 2);
        assert!(marker.is_history());
        assert!(!marker.is_selected());
        assert_eq!(marker.index, 2);
        assert!(!marker.to_record().selected);
    }

    #[test]
    fn test_set_selected_only_on_active() {
        let mut active = Marker::from_record(record(), MarkerList::Active, 0);
        assert!(active.is_selected());
        assert!(active.set_selected(false));
        assert!(!active.is_selected());

        let mut history = Marker::from_record(record(), MarkerList::History, 0);
        assert!(!history.set_selected(true));
        assert!(!history.is_selected());
    }

    #[test]
    fn test_same_record_ignores_mutable_fields() {
        let a = Marker::from_record(record(), MarkerList::Active, 0);
        let mut b = Marker::from_record(record(), MarkerList::Active, 4);
        b.description = PointDescription::named("Other");
        b.color = MarkerColor::Red;
        assert!(a.same_record(&b));

        let mut c = b.clone();
        c.created_at = c.created_at + chrono::Duration::nanoseconds(1);
        assert!(!a.same_record(&c));

        let mut d = b.clone();
        d.point = LatLon::new(0.5, 0.5);
        assert!(!a.same_record(&d));
    }

    #[test]
    fn test_record_round_trip_through_marker() {
        let rec = record();
        let marker = Marker::from_record(rec.clone(), MarkerList::Active, 0);
        assert_eq!(marker.to_record(), rec);
        assert_eq!(marker.list(), MarkerList::Active);
        assert_eq!(marker.color_index(), 1);
    }
}
