use std::collections::BTreeMap;

use log::warn;
use serde_json::Value;

use townsync_shared::{
    store::KeyedSnapshot,
    wire::{WireError, WireRecord, WorldEntity},
    EntityId,
};

/// What a remote snapshot of the entity directory changed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityDiff {
    pub spawned: Vec<WorldEntity>,
    pub removed: Vec<EntityId>,
    pub updated: Vec<WorldEntity>,
}

/// Local copy of the session's world entities
#[derive(Clone, Debug, Default)]
pub struct EntityDirectory {
    entities: BTreeMap<EntityId, WorldEntity>,
    raw: KeyedSnapshot,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entity written locally.
    pub fn insert_local(&mut self, entity: WorldEntity) -> Result<Value, WireError> {
        let value = entity.to_value()?;
        self.raw.insert(entity.id.clone(), value.clone());
        self.entities.insert(entity.id.clone(), entity);
        Ok(value)
    }

    pub fn remove_local(&mut self, id: &str) -> Option<WorldEntity> {
        self.raw.remove(id);
        self.entities.remove(id)
    }

    /// Reconciles with a remote snapshot of `entities`. Malformed entries
    /// are ignored.
    pub fn apply_snapshot(&mut self, value: Option<&Value>) -> EntityDiff {
        let mut next = KeyedSnapshot::new();
        let mut parsed = BTreeMap::new();
        if let Some(Value::Object(children)) = value {
            for (key, child) in children {
                match WorldEntity::from_value(child) {
                    Ok(entity) if &entity.id == key => {
                        next.insert(key.clone(), child.clone());
                        parsed.insert(key.clone(), entity);
                    }
                    Ok(entity) => warn!(
                        "EntityDirectory: entity under `{}` claims id `{}`, skipping",
                        key, entity.id
                    ),
                    Err(error) => warn!("EntityDirectory: skipping malformed entity `{}`: {}", key, error),
                }
            }
        }

        let changes = self.raw.diff(&next, None);
        let mut diff = EntityDiff::default();
        for id in changes.added {
            if let Some(entity) = parsed.remove(&id) {
                self.entities.insert(id, entity.clone());
                diff.spawned.push(entity);
            }
        }
        for id in changes.changed {
            if let Some(entity) = parsed.remove(&id) {
                self.entities.insert(id, entity.clone());
                diff.updated.push(entity);
            }
        }
        for id in changes.removed {
            self.entities.remove(&id);
            diff.removed.push(id);
        }

        self.raw = next;
        diff
    }

    pub fn get(&self, id: &str) -> Option<&WorldEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &WorldEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.raw = KeyedSnapshot::new();
    }
}
