//! Read-only views over the page's client-side storage.
//!
//! The locator only needs index/key enumeration plus lookup, which is what
//! `localStorage`/`sessionStorage` expose. `PageStorage` is a snapshot of both
//! areas and the document cookie string, deserializable from JSON so hosts can
//! capture it in the browser and hand it over.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A key/value storage surface enumerable by index.
pub trait StorageSurface {
    fn len(&self) -> usize;

    fn key(&self, index: usize) -> Option<String>;

    fn get_item(&self, key: &str) -> Option<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in index order. Keys without a value are skipped.
    fn entries(&self) -> Vec<(String, String)> {
        (0..self.len())
            .filter_map(|i| {
                let key = self.key(i)?;
                let value = self.get_item(&key)?;
                Some((key, value))
            })
            .collect()
    }
}

/// In-memory storage area preserving insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "AreaRepr")]
pub struct StorageArea {
    items: Vec<(String, String)>,
}

/// Accepted JSON shapes: `[["k","v"], ...]` or `{"k": "v", ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum AreaRepr {
    Pairs(Vec<(String, String)>),
    Map(Map<String, Value>),
}

impl From<AreaRepr> for StorageArea {
    fn from(repr: AreaRepr) -> Self {
        let mut area = StorageArea::new();
        match repr {
            AreaRepr::Pairs(pairs) => {
                for (k, v) in pairs {
                    area.set_item(k, v);
                }
            }
            AreaRepr::Map(map) => {
                for (k, v) in map {
                    // Storage only holds strings; anything else is kept as JSON text
                    let v = match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    area.set_item(k, v);
                }
            }
        }
        area
    }
}

impl StorageArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. Replacing keeps the key's original position.
    pub fn set_item(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.items.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_item(key, value);
        self
    }
}

impl StorageSurface for StorageArea {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.get(index).map(|(k, _)| k.clone())
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

/// Snapshot of everything the locator reads from a page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageStorage {
    pub local: StorageArea,
    pub session: StorageArea,
    pub cookie: String,
}

impl PageStorage {
    /// Storage surfaces in scan order: persistent first, then session-scoped.
    pub fn surfaces(&self) -> [&dyn StorageSurface; 2] {
        [&self.local, &self.session]
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }
}
