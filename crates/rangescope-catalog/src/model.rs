//! Catalog data model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Leaves
// ============================================================================

/// Two opaque date-like strings. No parsing or validation is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

impl DateRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// The value found by following frequency → category → instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Leaf {
    /// Instrument has no timeframe dimension.
    Direct(DateRange),
    /// Instrument has one date range per timeframe.
    Indexed(IndexMap<String, DateRange>),
    /// Neither shape; kept verbatim so the instrument is still listed.
    Unrecognized(serde_json::Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafShape {
    Direct,
    Indexed,
    Unrecognized,
}

impl Leaf {
    pub fn shape(&self) -> LeafShape {
        match self {
            Leaf::Direct(_) => LeafShape::Direct,
            Leaf::Indexed(_) => LeafShape::Indexed,
            Leaf::Unrecognized(_) => LeafShape::Unrecognized,
        }
    }

    /// Timeframe keys in document order, or `None` when the leaf has no
    /// timeframe dimension.
    pub fn timeframes(&self) -> Option<impl Iterator<Item = &str>> {
        match self {
            Leaf::Indexed(ranges) => Some(ranges.keys().map(String::as_str)),
            Leaf::Direct(_) | Leaf::Unrecognized(_) => None,
        }
    }

    pub fn range_for(&self, timeframe: &str) -> Option<&DateRange> {
        match self {
            Leaf::Indexed(ranges) => ranges.get(timeframe),
            Leaf::Direct(_) | Leaf::Unrecognized(_) => None,
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

pub type InstrumentMap = IndexMap<String, Leaf>;
pub type CategoryMap = IndexMap<String, InstrumentMap>;

/// Insertion-ordered `frequency → category → instrument → Leaf` mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    frequencies: IndexMap<String, CategoryMap>,
}

/// Size summary of a catalog, used for logging and `inspect`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub frequencies: usize,
    pub categories: usize,
    pub instruments: usize,
    pub direct_leaves: usize,
    pub indexed_leaves: usize,
    pub unrecognized_leaves: usize,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frequencies(frequencies: IndexMap<String, CategoryMap>) -> Self {
        Self { frequencies }
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frequencies(&self) -> impl Iterator<Item = &str> {
        self.frequencies.keys().map(String::as_str)
    }

    pub fn categories(&self, frequency: &str) -> Option<&CategoryMap> {
        self.frequencies.get(frequency)
    }

    pub fn instruments(&self, frequency: &str, category: &str) -> Option<&InstrumentMap> {
        self.categories(frequency)?.get(category)
    }

    pub fn leaf(&self, frequency: &str, category: &str, instrument: &str) -> Option<&Leaf> {
        self.instruments(frequency, category)?.get(instrument)
    }

    /// Insert (or overwrite) the leaf at a path, creating the intermediate
    /// levels as needed.
    pub fn insert_leaf(
        &mut self,
        frequency: impl Into<String>,
        category: impl Into<String>,
        instrument: impl Into<String>,
        leaf: Leaf,
    ) -> Option<Leaf> {
        self.frequencies
            .entry(frequency.into())
            .or_default()
            .entry(category.into())
            .or_default()
            .insert(instrument.into(), leaf)
    }

    /// Add an empty frequency level (a frequency with no categories is valid).
    pub fn insert_frequency(&mut self, frequency: impl Into<String>) {
        self.frequencies.entry(frequency.into()).or_default();
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            frequencies: self.frequencies.len(),
            ..CatalogStats::default()
        };
        for categories in self.frequencies.values() {
            stats.categories += categories.len();
            for instruments in categories.values() {
                stats.instruments += instruments.len();
                for leaf in instruments.values() {
                    match leaf.shape() {
                        LeafShape::Direct => stats.direct_leaves += 1,
                        LeafShape::Indexed => stats.indexed_leaves += 1,
                        LeafShape::Unrecognized => stats.unrecognized_leaves += 1,
                    }
                }
            }
        }
        stats
    }

    /// Serialize back to the wire shape the feed delivers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert_leaf(
            "monthly",
            "klines",
            "BTCUSDT",
            Leaf::Indexed(IndexMap::from([
                ("1h".to_string(), DateRange::new("2021-01", "2021-06")),
                ("1d".to_string(), DateRange::new("2020-01", "2021-06")),
            ])),
        );
        catalog.insert_leaf(
            "monthly",
            "trades",
            "BTCUSDT",
            Leaf::Direct(DateRange::new("2019-09", "2024-02")),
        );
        catalog.insert_frequency("daily");
        catalog
    }

    #[test]
    fn test_lookup_follows_path() {
        let catalog = sample();
        assert!(matches!(
            catalog.leaf("monthly", "trades", "BTCUSDT"),
            Some(Leaf::Direct(_))
        ));
        assert!(catalog.leaf("monthly", "trades", "ETHUSDT").is_none());
        assert!(catalog.leaf("daily", "trades", "BTCUSDT").is_none());
        assert!(catalog.instruments("weekly", "klines").is_none());
    }

    #[test]
    fn test_frequencies_keep_insertion_order() {
        let catalog = sample();
        assert_eq!(catalog.frequencies().collect::<Vec<_>>(), ["monthly", "daily"]);
    }

    #[test]
    fn test_indexed_timeframes_in_order() {
        let catalog = sample();
        let leaf = catalog.leaf("monthly", "klines", "BTCUSDT").unwrap();
        assert_eq!(leaf.timeframes().unwrap().collect::<Vec<_>>(), ["1h", "1d"]);
        assert_eq!(leaf.range_for("1d"), Some(&DateRange::new("2020-01", "2021-06")));
        assert!(leaf.range_for("4h").is_none());
    }

    #[test]
    fn test_direct_leaf_has_no_timeframes() {
        let leaf = Leaf::Direct(DateRange::new("a", "b"));
        assert!(leaf.timeframes().is_none());
        assert!(leaf.range_for("a").is_none());
    }

    #[test]
    fn test_stats_count_shapes() {
        let mut catalog = sample();
        catalog.insert_leaf(
            "daily",
            "klines",
            "ETHUSDT",
            Leaf::Unrecognized(serde_json::json!("n/a")),
        );
        let stats = catalog.stats();
        assert_eq!(stats.frequencies, 2);
        assert_eq!(stats.categories, 3);
        assert_eq!(stats.instruments, 3);
        assert_eq!(stats.direct_leaves, 1);
        assert_eq!(stats.indexed_leaves, 1);
        assert_eq!(stats.unrecognized_leaves, 1);
    }

    #[test]
    fn test_serializes_to_wire_shape() {
        let json = sample().to_json().unwrap();
        assert_eq!(
            json,
            r#"{"monthly":{"klines":{"BTCUSDT":{"1h":{"from":"2021-01","to":"2021-06"},"1d":{"from":"2020-01","to":"2021-06"}}},"trades":{"BTCUSDT":{"from":"2019-09","to":"2024-02"}}},"daily":{}}"#
        );
    }
}
