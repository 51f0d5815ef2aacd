//! Observation map
//!
//! A long-lived container keyed `"<observer>:<field>"`. The owner keeps one
//! instance for the lifetime of the server and recompiles it in place.

use crate::value::{Value, ValueMap};
use std::collections::BTreeMap;

/// Field name used for screen-capture observations
pub const CAMERA_FIELD: &str = "camera";

/// Build the `"<observer>:<field>"` key
pub fn observation_key(observer: &str, field: &str) -> String {
    format!("{}:{}", observer, field)
}

/// Flat observation map, overwritten key by key on each compile
///
/// A compile is bracketed by [`ObservationMap::begin_compile`] and
/// [`ObservationMap::finish_compile`]. Entries written in between are kept;
/// entries from earlier compiles that were not written again are pruned at
/// `finish_compile`, so a returned map never carries keys of observers that
/// are no longer valid or enabled.
#[derive(Debug, Default, Clone)]
pub struct ObservationMap {
    entries: BTreeMap<String, Entry>,
    generation: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    generation: u64,
    value: Value,
}

impl ObservationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new compile pass
    pub fn begin_compile(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Store `value` under `key`, reusing the existing slot when present
    pub fn insert(&mut self, key: &str, value: Value) {
        let generation = self.generation;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.generation = generation;
                entry.value = value;
            }
            None => {
                self.entries
                    .insert(key.to_string(), Entry { generation, value });
            }
        }
    }

    /// Drop every entry not written since the last `begin_compile`
    pub fn finish_compile(&mut self) {
        let generation = self.generation;
        self.entries.retain(|_, e| e.generation == generation);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot as a wire map
    pub fn to_value(&self) -> Value {
        let map: ValueMap = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect();
        Value::Map(map)
    }
}
