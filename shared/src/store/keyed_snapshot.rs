use std::collections::BTreeMap;

use serde_json::Value;

/// The children of one store node, keyed by child key.
///
/// Both the presence roster and the world-entity directory are reconciled by
/// comparing two of these: ids present only remotely were added, ids present
/// only locally were removed, and shared ids whose serialized value differs
/// were changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyedSnapshot {
    entries: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyedDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl KeyedDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl KeyedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a listener payload. Anything but an object is
    /// treated as an empty node.
    pub fn from_value(value: Option<&Value>) -> Self {
        let entries = match value {
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(_, child)| !child.is_null())
                .map(|(key, child)| (key.clone(), child.clone()))
                .collect(),
            _ => BTreeMap::new(),
        };
        Self { entries }
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Diff from `self` (what is known locally) to `next` (the newest remote
    /// snapshot). `exclude` is left out of every list.
    pub fn diff(&self, next: &KeyedSnapshot, exclude: Option<&str>) -> KeyedDiff {
        let skip = |key: &String| Some(key.as_str()) == exclude;
        let mut diff = KeyedDiff::default();

        for (key, value) in next.entries.iter() {
            if skip(key) {
                continue;
            }
            match self.entries.get(key) {
                None => diff.added.push(key.clone()),
                Some(known) if known != value => diff.changed.push(key.clone()),
                Some(_) => {}
            }
        }
        for key in self.entries.keys() {
            if !skip(key) && !next.entries.contains_key(key) {
                diff.removed.push(key.clone());
            }
        }

        diff
    }
}
