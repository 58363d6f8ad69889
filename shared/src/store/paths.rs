use crate::types::{EntityId, ParticipantId};

pub const SESSIONS_ROOT: &str = "sessions";

/// Splits a store path into its non-empty segments.
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `key` can be used as a single path segment.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
}

/// Every store path used by one session. The session id scopes all of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPaths {
    root: String,
}

impl SessionPaths {
    pub fn new(session_id: &str) -> Self {
        Self {
            root: format!("{}/{}", SESSIONS_ROOT, session_id),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn metadata(&self) -> String {
        format!("{}/metadata", self.root)
    }

    // Presence

    pub fn players(&self) -> String {
        format!("{}/players", self.root)
    }

    pub fn player(&self, participant_id: &ParticipantId) -> String {
        format!("{}/players/{}", self.root, participant_id)
    }

    // World grid

    pub fn map(&self) -> String {
        format!("{}/map", self.root)
    }

    pub fn map_changes(&self) -> String {
        format!("{}/map/changes", self.root)
    }

    pub fn map_change(&self, x: i32, y: i32) -> String {
        format!("{}/map/changes/{}", self.root, Self::change_key(x, y))
    }

    pub fn change_key(x: i32, y: i32) -> String {
        format!("{}_{}", x, y)
    }

    // Fast-path replication

    pub fn sync_players(&self) -> String {
        format!("{}/sync/players", self.root)
    }

    pub fn sync_player(&self, participant_id: &ParticipantId) -> String {
        format!("{}/sync/players/{}", self.root, participant_id)
    }

    pub fn sync_npcs(&self) -> String {
        format!("{}/sync/npcs", self.root)
    }

    pub fn sync_npc(&self, npc_id: &EntityId) -> String {
        format!("{}/sync/npcs/{}", self.root, npc_id)
    }

    pub fn sync_events(&self) -> String {
        format!("{}/sync/events", self.root)
    }

    // World entities

    pub fn entities(&self) -> String {
        format!("{}/entities", self.root)
    }

    pub fn entity(&self, entity_id: &EntityId) -> String {
        format!("{}/entities/{}", self.root, entity_id)
    }
}
