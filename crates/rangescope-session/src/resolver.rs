//! Pure path resolution over a catalog and a selection.
//!
//! Nothing here holds state. Every lookup goes through `Option`, so a
//! selection that names a key the current catalog no longer has simply
//! resolves to nothing.

use rangescope_catalog::{Catalog, Leaf};
use serde::Serialize;

use crate::selection::Selection;

/// Timeframe options for the selected instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timeframes<'a> {
    /// No timeframe chooser: the leaf is Direct, unrecognized, or absent.
    NotApplicable,
    /// The leaf is Indexed; these are its keys (possibly none).
    Options(Vec<&'a str>),
}

impl<'a> Timeframes<'a> {
    pub fn is_applicable(&self) -> bool {
        matches!(self, Timeframes::Options(_))
    }

    pub fn options(&self) -> Option<&[&'a str]> {
        match self {
            Timeframes::Options(options) => Some(options.as_slice()),
            Timeframes::NotApplicable => None,
        }
    }
}

/// The displayable outcome of a complete selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    /// Timeframe the range belongs to; `None` for Direct leaves.
    pub label: Option<String>,
    pub from: String,
    pub to: String,
}

pub fn available_frequencies(catalog: &Catalog) -> Vec<&str> {
    catalog.frequencies().collect()
}

pub fn available_categories<'a>(catalog: &'a Catalog, frequency: Option<&str>) -> Vec<&'a str> {
    frequency
        .and_then(|frequency| catalog.categories(frequency))
        .map(|categories| categories.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

pub fn available_instruments<'a>(
    catalog: &'a Catalog,
    frequency: Option<&str>,
    category: Option<&str>,
) -> Vec<&'a str> {
    match (frequency, category) {
        (Some(frequency), Some(category)) => catalog
            .instruments(frequency, category)
            .map(|instruments| instruments.keys().map(String::as_str).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

pub fn leaf_of<'a>(
    catalog: &'a Catalog,
    frequency: Option<&str>,
    category: Option<&str>,
    instrument: Option<&str>,
) -> Option<&'a Leaf> {
    catalog.leaf(frequency?, category?, instrument?)
}

pub fn available_timeframes(leaf: Option<&Leaf>) -> Timeframes<'_> {
    match leaf.and_then(Leaf::timeframes) {
        Some(keys) => Timeframes::Options(keys.collect()),
        None => Timeframes::NotApplicable,
    }
}

/// Resolve a selection to a date range.
///
/// Only two combinations produce a result: an Indexed leaf with a present
/// timeframe selected, and a Direct leaf with no timeframe selected. Partial
/// or mismatched selections resolve to `None`.
pub fn resolve(catalog: &Catalog, selection: &Selection) -> Option<Resolved> {
    let leaf = leaf_of(
        catalog,
        selection.frequency(),
        selection.category(),
        selection.instrument(),
    )?;

    match (leaf, selection.timeframe()) {
        (Leaf::Indexed(ranges), Some(timeframe)) => {
            let range = ranges.get(timeframe)?;
            Some(Resolved {
                label: Some(timeframe.to_string()),
                from: range.from.clone(),
                to: range.to.clone(),
            })
        }
        (Leaf::Direct(range), None) => Some(Resolved {
            label: None,
            from: range.from.clone(),
            to: range.to.clone(),
        }),
        _ => None,
    }
}
