//! Side-channel metadata attached to every [`Frame`](crate::frame::Frame).
//!
//! A frame owns exactly one [`Metadata`] value. Frame-deriving operations
//! clone it into the derived frame; the hopper then re-asserts its own slot
//! on both frames after any operation it performed.

use std::collections::{BTreeMap, HashMap};

use hopper_predicate::Predicate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EncodingError, HopperError};

/// Schema metadata key holding the pending filter queue.
pub const HOPPER_FILTERS_KEY: &str = "hopper_filters";
/// Schema metadata key holding the pending derived-column queue.
pub const HOPPER_COLUMNS_KEY: &str = "hopper_columns";
/// Schema metadata key holding user entries.
pub const HOPPER_META_KEY: &str = "hopper_meta";

/// A boolean column to be materialised once its inputs exist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedColumn {
    name: String,
    predicate: Predicate,
}

impl DerivedColumn {
    /// Column `name` holding the row-wise result of `predicate`.
    #[must_use]
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    /// Output column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Predicate evaluated per row.
    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

/// Pending work owned by the hopper.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HopperState {
    pub(crate) filters: Vec<Predicate>,
    pub(crate) columns: Vec<DerivedColumn>,
}

impl HopperState {
    /// Pending filters in insertion order.
    #[must_use]
    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    /// Pending derived columns in insertion order.
    #[must_use]
    pub fn columns(&self) -> &[DerivedColumn] {
        &self.columns
    }

    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.columns.is_empty()
    }
}

/// Key/value side-store plus the typed hopper slot.
///
/// The hopper slot is `None` until a hopper is first attached to the owning
/// frame and is never unset afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    entries: BTreeMap<String, Value>,
    hopper: Option<HopperState>,
}

impl Metadata {
    /// Look up a user entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Look up a user entry that must exist.
    pub fn require(&self, key: &str) -> Result<&Value, HopperError> {
        self.entries
            .get(key)
            .ok_or_else(|| HopperError::AttributeNotFound {
                name: key.to_string(),
            })
    }

    /// Insert or replace a user entry, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a user entry.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Iterate user entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Hopper state, if a hopper was ever attached.
    #[must_use]
    pub fn hopper(&self) -> Option<&HopperState> {
        self.hopper.as_ref()
    }

    /// Hopper state, created empty on first access.
    pub fn hopper_or_default(&mut self) -> &mut HopperState {
        self.hopper.get_or_insert_with(HopperState::default)
    }

    /// Replace the hopper state wholesale.
    pub fn set_hopper(&mut self, state: HopperState) {
        self.hopper = Some(state);
    }

    /// Write this metadata into Arrow schema metadata as JSON strings.
    ///
    /// Keys this crate owns are always cleared first, so entries inherited
    /// from an earlier export never outlive the state they described.
    pub(crate) fn encode_into(
        &self,
        out: &mut HashMap<String, String>,
    ) -> Result<(), EncodingError> {
        for key in [HOPPER_META_KEY, HOPPER_FILTERS_KEY, HOPPER_COLUMNS_KEY] {
            out.remove(key);
        }
        if !self.entries.is_empty() {
            let text = serde_json::to_string(&self.entries).map_err(|source| {
                EncodingError::Metadata {
                    key: HOPPER_META_KEY,
                    source,
                }
            })?;
            out.insert(HOPPER_META_KEY.to_string(), text);
        }
        if let Some(state) = &self.hopper {
            let filters = serde_json::to_string(&state.filters).map_err(|source| {
                EncodingError::Metadata {
                    key: HOPPER_FILTERS_KEY,
                    source,
                }
            })?;
            let columns = serde_json::to_string(&state.columns).map_err(|source| {
                EncodingError::Metadata {
                    key: HOPPER_COLUMNS_KEY,
                    source,
                }
            })?;
            out.insert(HOPPER_FILTERS_KEY.to_string(), filters);
            out.insert(HOPPER_COLUMNS_KEY.to_string(), columns);
        }
        Ok(())
    }

    /// Read metadata back out of Arrow schema metadata, removing the keys it owns.
    pub(crate) fn decode_from(
        schema_metadata: &mut HashMap<String, String>,
    ) -> Result<Self, EncodingError> {
        let mut metadata = Metadata::default();
        if let Some(text) = schema_metadata.remove(HOPPER_META_KEY) {
            metadata.entries =
                serde_json::from_str(&text).map_err(|source| EncodingError::Metadata {
                    key: HOPPER_META_KEY,
                    source,
                })?;
        }
        let filters = schema_metadata.remove(HOPPER_FILTERS_KEY);
        let columns = schema_metadata.remove(HOPPER_COLUMNS_KEY);
        if filters.is_some() || columns.is_some() {
            let mut state = HopperState::default();
            if let Some(text) = filters {
                state.filters =
                    serde_json::from_str(&text).map_err(|source| EncodingError::Metadata {
                        key: HOPPER_FILTERS_KEY,
                        source,
                    })?;
            }
            if let Some(text) = columns {
                state.columns =
                    serde_json::from_str(&text).map_err(|source| EncodingError::Metadata {
                        key: HOPPER_COLUMNS_KEY,
                        source,
                    })?;
            }
            metadata.hopper = Some(state);
        }
        Ok(metadata)
    }
}
