use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EntityId, Millis, ParticipantId};

use super::{
    error::WireError,
    record::{require_key, WireRecord},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameEventType {
    PlayerShot,
    PlayerHit,
    PlayerDied,
    NpcSpawned,
    NpcDied,
    DamageDealt,
    ItemPickedUp,
    Custom,
}

/// A one-shot fact fanned out through `sync/events`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub event_type: GameEventType,
    pub source_id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(rename = "data", default)]
    pub payload: Value,
    #[serde(default)]
    pub timestamp: Millis,
}

impl GameEvent {
    pub fn new(event_type: GameEventType, source_id: impl Into<ParticipantId>) -> Self {
        Self {
            event_type,
            source_id: source_id.into(),
            target_id: None,
            payload: Value::Null,
            timestamp: 0,
        }
    }

    pub fn with_target(mut self, target_id: impl Into<EntityId>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn at(mut self, timestamp: Millis) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl WireRecord for GameEvent {
    fn validate(&self) -> Result<(), WireError> {
        require_key("sourceId", &self.source_id)
    }
}
