//! Rangescope catalog
//!
//! The catalog is the nested dataset pushed by the feed:
//!
//! ```text
//! frequency ──► category ──► instrument ──► Leaf
//!                                            ├─ Direct   { from, to }
//!                                            └─ Indexed  { timeframe ──► { from, to } }
//! ```
//!
//! Leaf shape is decided once, at ingestion, per instrument. Downstream code
//! never re-inspects raw JSON to find out which variant it is looking at.
//!
//! - [`model`]: `DateRange`, `Leaf`, `Catalog`
//! - [`ingest`]: JSON → `Catalog` with shape detection
//! - [`store`]: `CatalogStore`, the atomically replaced current snapshot

pub mod ingest;
pub mod model;
pub mod store;

pub use ingest::{catalog_from_value, classify_leaf, parse_catalog, CatalogError};
pub use model::{Catalog, CatalogStats, CategoryMap, DateRange, InstrumentMap, Leaf, LeafShape};
pub use store::CatalogStore;
