//! The current catalog snapshot.

use std::sync::Arc;

use crate::ingest::{parse_catalog, CatalogError};
use crate::model::Catalog;

/// Holds the latest full catalog. Snapshots are swapped wholesale, never
/// merged or mutated in place.
#[derive(Debug, Default)]
pub struct CatalogStore {
    current: Option<Arc<Catalog>>,
    generation: u64,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new snapshot and return its generation (starting at 1).
    pub fn replace(&mut self, snapshot: Catalog) -> u64 {
        self.current = Some(Arc::new(snapshot));
        self.generation += 1;
        self.generation
    }

    /// Parse a feed document and replace the snapshot with it.
    ///
    /// A document that does not parse leaves the previous snapshot in place.
    pub fn ingest(&mut self, payload: &str) -> Result<u64, CatalogError> {
        let catalog = parse_catalog(payload)?;
        let stats = catalog.stats();
        let generation = self.replace(catalog);
        tracing::debug!(
            generation,
            frequencies = stats.frequencies,
            instruments = stats.instruments,
            "catalog replaced"
        );
        Ok(generation)
    }

    /// `None` until the first snapshot arrives.
    pub fn current(&self) -> Option<&Catalog> {
        self.current.as_deref()
    }

    pub fn snapshot(&self) -> Option<Arc<Catalog>> {
        self.current.clone()
    }

    /// Number of snapshots applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
