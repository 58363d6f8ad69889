use serde::{Deserialize, Serialize};

use crate::types::{EntityId, Millis, ParticipantId};

use super::{
    error::WireError,
    record::{require_finite, require_key, WireRecord},
    transform::NetworkTransform,
};

pub const DEFAULT_HEALTH: f32 = 100.0;

/// NPC behaviour. `Dead` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorState {
    #[default]
    Idle,
    Roaming,
    Chasing,
    Attacking,
    Dead,
}

impl BehaviorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BehaviorState::Dead)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerDetails {
    pub score: i32,
    pub current_weapon: String,
    pub is_shooting: bool,
    pub is_reloading: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NpcDetails {
    pub behavior: BehaviorState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_damaged_by: Option<ParticipantId>,
}

/// Fields only one kind of entity carries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityDetails {
    Player(PlayerDetails),
    Npc(NpcDetails),
}

impl Default for EntityDetails {
    fn default() -> Self {
        EntityDetails::Player(PlayerDetails::default())
    }
}

/// Fast-changing state of a player or NPC, as published on the sync paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityState {
    pub id: EntityId,
    pub transform: NetworkTransform,
    pub health: f32,
    pub is_dead: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    /// Participant that published this sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authored_by: Option<ParticipantId>,
    pub details: EntityDetails,
}

impl Default for EntityState {
    fn default() -> Self {
        Self {
            id: EntityId::new(),
            transform: NetworkTransform::default(),
            health: DEFAULT_HEALTH,
            is_dead: false,
            action: None,
            target_id: None,
            authored_by: None,
            details: EntityDetails::default(),
        }
    }
}

impl EntityState {
    pub fn player(id: impl Into<EntityId>, transform: NetworkTransform) -> Self {
        Self {
            id: id.into(),
            transform,
            ..Default::default()
        }
    }

    pub fn npc(id: impl Into<EntityId>, transform: NetworkTransform) -> Self {
        Self {
            id: id.into(),
            transform,
            details: EntityDetails::Npc(NpcDetails::default()),
            ..Default::default()
        }
    }

    pub fn is_npc(&self) -> bool {
        matches!(self.details, EntityDetails::Npc(_))
    }

    pub fn is_player(&self) -> bool {
        matches!(self.details, EntityDetails::Player(_))
    }

    pub fn timestamp(&self) -> Millis {
        self.transform.timestamp
    }

    pub fn with_timestamp(mut self, timestamp: Millis) -> Self {
        self.transform.timestamp = timestamp;
        self
    }

    pub fn behavior(&self) -> Option<BehaviorState> {
        match &self.details {
            EntityDetails::Npc(npc) => Some(npc.behavior),
            EntityDetails::Player(_) => None,
        }
    }

    pub fn set_behavior(&mut self, behavior: BehaviorState) {
        if let EntityDetails::Npc(npc) = &mut self.details {
            npc.behavior = behavior;
        }
    }

    pub fn npc_details(&self) -> Option<&NpcDetails> {
        match &self.details {
            EntityDetails::Npc(npc) => Some(npc),
            EntityDetails::Player(_) => None,
        }
    }

    pub fn npc_details_mut(&mut self) -> Option<&mut NpcDetails> {
        match &mut self.details {
            EntityDetails::Npc(npc) => Some(npc),
            EntityDetails::Player(_) => None,
        }
    }

    pub fn player_details(&self) -> Option<&PlayerDetails> {
        match &self.details {
            EntityDetails::Player(player) => Some(player),
            EntityDetails::Npc(_) => None,
        }
    }

    /// Dead players and NPCs never come back through replication.
    pub fn is_terminal(&self) -> bool {
        self.is_dead || self.behavior().map_or(false, BehaviorState::is_terminal)
    }

    /// Moves the entity into its terminal state.
    pub fn mark_dead(&mut self) {
        self.is_dead = true;
        self.health = 0.0;
        self.set_behavior(BehaviorState::Dead);
    }

    /// Copy of `self` whose continuous fields come from `transform` and
    /// whose discrete fields are left untouched.
    pub fn with_transform(&self, transform: NetworkTransform) -> Self {
        Self {
            transform,
            ..self.clone()
        }
    }
}

impl WireRecord for EntityState {
    fn validate(&self) -> Result<(), WireError> {
        require_key("id", &self.id)?;
        self.transform.validate()?;
        require_finite("health", self.health)?;
        Ok(())
    }
}
