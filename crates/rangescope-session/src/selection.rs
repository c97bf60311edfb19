//! Selection state machine.
//!
//! Four ordered slots. Only contiguous prefixes are reachable:
//!
//! ```text
//! ()  ──f──►  (f)  ──c──►  (f,c)  ──i──►  (f,c,i)  ──t──►  (f,c,i,t)
//! ```
//!
//! Setting a slot clears every deeper slot. Setting a slot whose parent is
//! unset is ignored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Frequency,
    Category,
    Instrument,
    Timeframe,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::Frequency,
        Slot::Category,
        Slot::Instrument,
        Slot::Timeframe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Frequency => "frequency",
            Slot::Category => "category",
            Slot::Instrument => "instrument",
            Slot::Timeframe => "timeframe",
        }
    }

    pub fn parent(self) -> Option<Slot> {
        match self {
            Slot::Frequency => None,
            Slot::Category => Some(Slot::Frequency),
            Slot::Instrument => Some(Slot::Category),
            Slot::Timeframe => Some(Slot::Instrument),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown slot `{0}` (expected frequency|category|instrument|timeframe)")]
pub struct UnknownSlot(pub String);

impl FromStr for Slot {
    type Err = UnknownSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frequency" | "freq" | "f" => Ok(Slot::Frequency),
            "category" | "cat" | "c" => Ok(Slot::Category),
            "instrument" | "inst" | "i" => Ok(Slot::Instrument),
            "timeframe" | "tf" | "t" => Ok(Slot::Timeframe),
            other => Err(UnknownSlot(other.to_string())),
        }
    }
}

/// The user's current drill-down path.
///
/// Slots hold keys as the user picked them. Whether a key still exists in
/// the current catalog is the resolver's concern, not this type's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "SelectionFields", into = "SelectionFields")]
pub struct Selection {
    slots: [Option<String>; 4],
}

/// Wire form of [`Selection`]: one named field per slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SelectionFields {
    frequency: Option<String>,
    category: Option<String>,
    instrument: Option<String>,
    timeframe: Option<String>,
}

impl From<Selection> for SelectionFields {
    fn from(selection: Selection) -> Self {
        let [frequency, category, instrument, timeframe] = selection.slots;
        Self {
            frequency,
            category,
            instrument,
            timeframe,
        }
    }
}

impl From<SelectionFields> for Selection {
    fn from(fields: SelectionFields) -> Self {
        // Re-applying through `set` drops anything that is not a prefix.
        let mut selection = Selection::new();
        let values = [
            fields.frequency,
            fields.category,
            fields.instrument,
            fields.timeframe,
        ];
        for (slot, value) in Slot::ALL.into_iter().zip(values) {
            match value {
                Some(key) => {
                    selection.set(slot, key);
                }
                None => break,
            }
        }
        selection
    }
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.slots[slot.index()].as_deref()
    }

    pub fn frequency(&self) -> Option<&str> {
        self.get(Slot::Frequency)
    }

    pub fn category(&self) -> Option<&str> {
        self.get(Slot::Category)
    }

    pub fn instrument(&self) -> Option<&str> {
        self.get(Slot::Instrument)
    }

    pub fn timeframe(&self) -> Option<&str> {
        self.get(Slot::Timeframe)
    }

    /// Set `slot` and clear everything below it.
    ///
    /// Returns `false` (and changes nothing) when the parent slot is unset.
    pub fn set(&mut self, slot: Slot, key: impl Into<String>) -> bool {
        if let Some(parent) = slot.parent() {
            if self.get(parent).is_none() {
                return false;
            }
        }
        self.slots[slot.index()] = Some(key.into());
        self.clear_below(slot);
        true
    }

    pub fn set_frequency(&mut self, frequency: impl Into<String>) -> bool {
        self.set(Slot::Frequency, frequency)
    }

    pub fn set_category(&mut self, category: impl Into<String>) -> bool {
        self.set(Slot::Category, category)
    }

    pub fn set_instrument(&mut self, instrument: impl Into<String>) -> bool {
        self.set(Slot::Instrument, instrument)
    }

    pub fn set_timeframe(&mut self, timeframe: impl Into<String>) -> bool {
        self.set(Slot::Timeframe, timeframe)
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// Number of set slots (always a prefix).
    pub fn depth(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    fn clear_below(&mut self, slot: Slot) {
        for deeper in &mut self.slots[slot.index() + 1..] {
            *deeper = None;
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.slots.iter().map_while(|slot| slot.as_deref()).collect();
        if parts.is_empty() {
            f.write_str("(none)")
        } else {
            f.write_str(&parts.join(" / "))
        }
    }
}
