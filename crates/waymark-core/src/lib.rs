//! Core library for waymark.
//!
//! Saved map markers split into an ordered active list and a most-recent-first
//! history, persisted through a pluggable gateway and enriched with addresses
//! from a reverse geocoding provider.

pub mod config;
pub mod error;
pub mod geocoding;
pub mod models;
pub mod notifier;
pub mod persistence;
pub mod repository;

pub use config::Config;
pub use error::{MarkerError, MarkerResult, StoreError};
pub use geocoding::{
    AddressResolver, DisabledGeocoder, GeocodingService, LookupOutcome, LookupRequest,
    LookupToken, NominatimGeocoder, NominatimSettings,
};
pub use models::{LatLon, Marker, MarkerColor, MarkerList, MarkerRecord, PointDescription};
pub use notifier::{ChangeNotifier, MarkerObserver};
pub use persistence::{JsonStore, MemoryStore, PersistenceGateway};
pub use repository::{MarkerRepository, MarkerSnapshot};
