//! fleet-catalog — the persisted device catalog for Fleetwatch.
//!
//! The catalog maps categories to named devices and their addresses.
//! It is stored as a single human-editable JSON document:
//!
//! ```json
//! { "categories": { "Printers": { "office": "192.168.1.40" } } }
//! ```
//!
//! Writes copy the previous file to `<path>.bak` (when enabled) and then
//! atomically replace the document through a temp file. An in-memory
//! backend is provided for tests.
//!
//! Status checks never keep a catalog around: callers `load()` a fresh
//! snapshot per request and flatten it with [`Catalog::entries`].

pub mod error;
pub mod store;
pub mod types;
pub mod validate;

pub use error::{CatalogError, CatalogResult};
pub use store::CatalogStore;
pub use types::Catalog;
