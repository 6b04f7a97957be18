use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A geographic point in decimal degrees.
///
/// Equality and hashing use the exact bit pattern of both components so a
/// coordinate can key lookup maps. `-0.0` is folded into `0.0` first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLon {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn key(&self) -> (u64, u64) {
        (normalize(self.latitude), normalize(self.longitude))
    }
}

fn normalize(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for LatLon {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for LatLon {}

impl Hash for LatLon {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}
