//! Marker persistence.
//!
//! `PersistenceGateway` is the narrow surface the repository writes through.
//! Two stores implement it: `MemoryStore` for embedding and tests, and
//! `JsonStore`, which keeps both collections in a single JSON file.

pub mod gateway;
pub mod json_store;
pub mod memory;

pub use gateway::{PersistenceGateway, StoredMarkers};
pub use json_store::{JsonStore, MARKERS_FILE};
pub use memory::MemoryStore;
