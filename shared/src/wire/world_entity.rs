use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::EntityId;

use super::{
    entity_state::DEFAULT_HEALTH,
    error::WireError,
    record::{require_finite, require_key, WireRecord},
};

/// A persistent, slowly-changing object in the town (crates, barricades,
/// dropped items). Stored under `entities/{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldEntity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rotation: f32,
    pub health: f32,
    pub active: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub custom_data: Map<String, Value>,
}

impl Default for WorldEntity {
    fn default() -> Self {
        Self {
            id: EntityId::new(),
            entity_type: String::new(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            rotation: 0.0,
            health: DEFAULT_HEALTH,
            active: true,
            custom_data: Map::new(),
        }
    }
}

impl WorldEntity {
    pub fn new(id: impl Into<EntityId>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }
}

impl WireRecord for WorldEntity {
    fn validate(&self) -> Result<(), WireError> {
        require_key("id", &self.id)?;
        require_finite("x", self.x)?;
        require_finite("y", self.y)?;
        require_finite("z", self.z)?;
        require_finite("rotation", self.rotation)?;
        require_finite("health", self.health)
    }
}
