//! The marker repository.
//!
//! `MarkerRepository` owns the active and history lists, writes every change
//! through a `PersistenceGateway`, reloads from it, and notifies observers.
//! Reverse geocoding results are fed back through the same path
//! (`resolve_all`, `process_address_results`, `settle_addresses`).

mod addresses;
pub mod markers;

pub use markers::{MarkerRepository, MarkerSnapshot};
