//! Reverse geocoding for markers that still wait for an address.
//!
//! `GeocodingService` is the provider contract (request, cancel, callback).
//! `AddressResolver` sits between the repository and a provider and keeps
//! one current lookup per coordinate. `NominatimGeocoder` is an HTTP
//! provider for Nominatim-compatible servers.

pub mod nominatim;
pub mod resolver;
pub mod service;

pub use nominatim::{GeocodeError, NominatimGeocoder, NominatimSettings};
pub use resolver::AddressResolver;
pub use service::{
    DisabledGeocoder, GeocodingService, LookupOutcome, LookupRequest, LookupToken,
};
