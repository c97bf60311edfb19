//! JSON ingestion with per-instrument shape detection.
//!
//! The three upper levels (catalog, frequency, category) must be JSON
//! objects; a snapshot that breaks this is rejected as a whole. The
//! instrument level is more forgiving: a value that is neither a Direct nor
//! an Indexed leaf becomes [`Leaf::Unrecognized`] and the rest of the
//! snapshot is kept.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{Catalog, CategoryMap, DateRange, InstrumentMap, Leaf};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected an object at `{path}`, found {found}")]
    NotAnObject { path: String, found: &'static str },
}

/// Parse one feed document into a catalog.
pub fn parse_catalog(text: &str) -> Result<Catalog, CatalogError> {
    let value: Value = serde_json::from_str(text)?;
    catalog_from_value(value)
}

pub fn catalog_from_value(value: Value) -> Result<Catalog, CatalogError> {
    let root = into_object(value, "$")?;
    let mut frequencies = IndexMap::with_capacity(root.len());

    for (frequency, categories_value) in root {
        let path = format!("$.{frequency}");
        let categories_obj = into_object(categories_value, &path)?;
        let mut categories = CategoryMap::with_capacity(categories_obj.len());

        for (category, instruments_value) in categories_obj {
            let path = format!("$.{frequency}.{category}");
            let instruments_obj = into_object(instruments_value, &path)?;
            let mut instruments = InstrumentMap::with_capacity(instruments_obj.len());

            for (instrument, leaf_value) in instruments_obj {
                let leaf = classify_leaf(leaf_value);
                if let Leaf::Unrecognized(_) = &leaf {
                    tracing::warn!(
                        path = %format!("$.{frequency}.{category}.{instrument}"),
                        "instrument is neither a date range nor a timeframe map"
                    );
                }
                instruments.insert(instrument, leaf);
            }
            categories.insert(category, instruments);
        }
        frequencies.insert(frequency, categories);
    }

    Ok(Catalog::from_frequencies(frequencies))
}

/// Decide the shape of one instrument value.
///
/// - `{"from": str, "to": str}` and nothing else → `Direct`
/// - an object whose every value is such a range (possibly none) → `Indexed`
/// - anything else → `Unrecognized`
pub fn classify_leaf(value: Value) -> Leaf {
    let obj = match value {
        Value::Object(obj) => obj,
        other => return Leaf::Unrecognized(other),
    };

    if let Some(range) = date_range(&obj) {
        return Leaf::Direct(range);
    }

    let ranges: Option<IndexMap<String, DateRange>> = obj
        .iter()
        .map(|(timeframe, entry)| {
            let range = entry.as_object().and_then(date_range)?;
            Some((timeframe.clone(), range))
        })
        .collect();

    match ranges {
        Some(ranges) => Leaf::Indexed(ranges),
        None => Leaf::Unrecognized(Value::Object(obj)),
    }
}

fn date_range(obj: &Map<String, Value>) -> Option<DateRange> {
    if obj.len() != 2 {
        return None;
    }
    let from = obj.get("from")?.as_str()?;
    let to = obj.get("to")?.as_str()?;
    Some(DateRange::new(from, to))
}

fn into_object(value: Value, path: &str) -> Result<Map<String, Value>, CatalogError> {
    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(CatalogError::NotAnObject {
            path: path.to_string(),
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
