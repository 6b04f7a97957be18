use serde::{Deserialize, Serialize};

/// Label shown while a reverse geocoding lookup is outstanding.
pub const SEARCHING_ADDRESS: &str = "Searching address...";

/// Label written when reverse geocoding came back empty.
pub const ADDRESS_NOT_FOUND: &str = "Address not found";

/// Type name used when a marker has no label of its own.
pub const MAP_MARKER_TYPE_NAME: &str = "Map marker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionKind {
    /// Free-text name supplied by the user or by a search result.
    Name,
    /// A bare location; its name comes from reverse geocoding.
    Location,
}

/// Marker label plus its type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointDescription {
    pub kind: DescriptionKind,
    pub name: String,
    /// Set while the name is the searching sentinel and a lookup is owed.
    #[serde(default)]
    pub address_pending: bool,
}

impl PointDescription {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Name,
            name: name.into(),
            address_pending: false,
        }
    }

    /// A location description. An empty name becomes the searching
    /// sentinel and flags the description as pending.
    pub fn location(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Self {
                kind: DescriptionKind::Location,
                name: SEARCHING_ADDRESS.to_string(),
                address_pending: true,
            }
        } else {
            Self {
                kind: DescriptionKind::Location,
                name,
                address_pending: false,
            }
        }
    }

    pub fn is_location(&self) -> bool {
        self.kind == DescriptionKind::Location
    }

    pub fn is_searching_address(&self) -> bool {
        self.address_pending
    }

    /// Apply a reverse geocoding result. An empty address maps to the
    /// not-found sentinel.
    pub fn resolve_address(&mut self, address: &str) {
        let address = address.trim();
        self.name = if address.is_empty() {
            ADDRESS_NOT_FOUND.to_string()
        } else {
            address.to_string()
        };
        self.address_pending = false;
    }

    /// The label, or the generic type name when the label is empty.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            MAP_MARKER_TYPE_NAME
        } else {
            &self.name
        }
    }
}

impl Default for PointDescription {
    fn default() -> Self {
        Self::location("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_location_is_pending() {
        let desc = PointDescription::location("");
        assert!(desc.is_location());
        assert!(desc.is_searching_address());
        assert_eq!(desc.name, SEARCHING_ADDRESS);
    }

    #[test]
    fn test_named_location_is_not_pending() {
        let desc = PointDescription::location("Trailhead");
        assert!(!desc.is_searching_address());
        assert_eq!(desc.name, "Trailhead");
    }

    #[test]
    fn test_resolve_address() {
        let mut desc = PointDescription::default();
        desc.resolve_address("1 Main St");
        assert_eq!(desc.name, "1 Main St");
        assert!(!desc.is_searching_address());

        let mut desc = PointDescription::default();
        desc.resolve_address("   ");
        assert_eq!(desc.name, ADDRESS_NOT_FOUND);
        assert!(!desc.is_searching_address());
    }

    #[test]
    fn test_display_name_falls_back_to_type_name() {
        assert_eq!(PointDescription::named("").display_name(), MAP_MARKER_TYPE_NAME);
        assert_eq!(PointDescription::named("Camp").display_name(), "Camp");
    }

    #[test]
    fn test_missing_pending_flag_defaults_to_false() {
        let desc: PointDescription =
            serde_json::from_str(r#"{"kind":"name","name":"Lake"}"#).unwrap();
        assert_eq!(desc, PointDescription::named("Lake"));
    }
}
