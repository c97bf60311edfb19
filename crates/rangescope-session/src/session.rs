//! The session context: one catalog store plus one selection.

use rangescope_catalog::{Catalog, CatalogError, CatalogStore, Leaf};
use serde::Serialize;

use crate::resolver::{self, Resolved, Timeframes};
use crate::selection::{Selection, Slot};

/// Everything the presentation layer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// Catalog generation this view was computed from (0 = no data yet).
    pub generation: u64,
    pub selection: Selection,
    pub frequencies: Vec<String>,
    pub categories: Vec<String>,
    pub instruments: Vec<String>,
    /// `None` when the selected instrument has no timeframe chooser.
    pub timeframes: Option<Vec<String>>,
    /// Shallowest selected slot whose key the catalog no longer offers.
    pub stale: Option<Slot>,
    pub result: Option<Resolved>,
}

impl SessionView {
    pub fn has_data(&self) -> bool {
        self.generation > 0
    }
}

/// Owns the current catalog and the user's selection.
///
/// Replacing the catalog does not touch the selection: a slot that still
/// names an existing key keeps resolving, one that does not resolves to
/// nothing until the user picks again.
#[derive(Debug, Default)]
pub struct Session {
    store: CatalogStore,
    selection: Selection,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let mut session = Self::new();
        session.replace_catalog(catalog);
        session
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.store.current()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    // ========================================================================
    // Catalog updates
    // ========================================================================

    pub fn replace_catalog(&mut self, catalog: Catalog) -> u64 {
        let generation = self.store.replace(catalog);
        self.on_catalog_replaced(generation);
        generation
    }

    /// Parse and apply a raw feed document. On error the previous catalog
    /// stays current.
    pub fn ingest(&mut self, payload: &str) -> Result<u64, CatalogError> {
        let generation = self.store.ingest(payload)?;
        self.on_catalog_replaced(generation);
        Ok(generation)
    }

    fn on_catalog_replaced(&self, generation: u64) {
        if let Some(slot) = self.stale_slot() {
            tracing::debug!(
                generation,
                slot = %slot,
                selection = %self.selection,
                "selection no longer matches the catalog"
            );
        }
    }

    // ========================================================================
    // Selection transitions
    // ========================================================================

    /// Set one slot and clear everything below it.
    ///
    /// Picking a frequency before any catalog arrived is a no-op. Keys are
    /// not checked against the catalog: an unknown key just yields no deeper
    /// options. Returns whether the selection changed.
    pub fn select(&mut self, slot: Slot, key: impl Into<String>) -> bool {
        if slot == Slot::Frequency && self.catalog().is_none() {
            tracing::debug!("ignoring frequency pick: no catalog loaded yet");
            return false;
        }
        let key = key.into();
        if !self.selection.set(slot, key.as_str()) {
            tracing::warn!(
                slot = %slot,
                key = %key,
                "ignoring pick: {} is not selected",
                slot.parent().map(Slot::as_str).unwrap_or("parent")
            );
            return false;
        }
        true
    }

    pub fn set_frequency(&mut self, frequency: impl Into<String>) -> bool {
        self.select(Slot::Frequency, frequency)
    }

    pub fn set_category(&mut self, category: impl Into<String>) -> bool {
        self.select(Slot::Category, category)
    }

    pub fn set_instrument(&mut self, instrument: impl Into<String>) -> bool {
        self.select(Slot::Instrument, instrument)
    }

    pub fn set_timeframe(&mut self, timeframe: impl Into<String>) -> bool {
        self.select(Slot::Timeframe, timeframe)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    pub fn available_frequencies(&self) -> Vec<&str> {
        self.catalog()
            .map(resolver::available_frequencies)
            .unwrap_or_default()
    }

    pub fn available_categories(&self) -> Vec<&str> {
        self.catalog()
            .map(|catalog| resolver::available_categories(catalog, self.selection.frequency()))
            .unwrap_or_default()
    }

    pub fn available_instruments(&self) -> Vec<&str> {
        self.catalog()
            .map(|catalog| {
                resolver::available_instruments(
                    catalog,
                    self.selection.frequency(),
                    self.selection.category(),
                )
            })
            .unwrap_or_default()
    }

    pub fn leaf(&self) -> Option<&Leaf> {
        resolver::leaf_of(
            self.catalog()?,
            self.selection.frequency(),
            self.selection.category(),
            self.selection.instrument(),
        )
    }

    pub fn available_timeframes(&self) -> Timeframes<'_> {
        resolver::available_timeframes(self.leaf())
    }

    /// First selected slot whose key is not offered by the current catalog.
    pub fn stale_slot(&self) -> Option<Slot> {
        let options = [
            self.available_frequencies(),
            self.available_categories(),
            self.available_instruments(),
            self.available_timeframes()
                .options()
                .map(|keys| keys.to_vec())
                .unwrap_or_default(),
        ];
        Slot::ALL
            .into_iter()
            .zip(options)
            .map_while(|(slot, options)| Some((slot, self.selection.get(slot)?, options)))
            .find(|(_, key, options)| !options.contains(key))
            .map(|(slot, _, _)| slot)
    }

    pub fn resolve(&self) -> Option<Resolved> {
        resolver::resolve(self.catalog()?, &self.selection)
    }

    pub fn view(&self) -> SessionView {
        fn owned(keys: Vec<&str>) -> Vec<String> {
            keys.into_iter().map(str::to_string).collect()
        }

        SessionView {
            generation: self.generation(),
            selection: self.selection.clone(),
            frequencies: owned(self.available_frequencies()),
            categories: owned(self.available_categories()),
            instruments: owned(self.available_instruments()),
            timeframes: match self.available_timeframes() {
                Timeframes::Options(keys) => Some(owned(keys)),
                Timeframes::NotApplicable => None,
            },
            stale: self.stale_slot(),
            result: self.resolve(),
        }
    }
}
