use std::time::Duration;

use serde::{Deserialize, Serialize};

use townsync_shared::ConflictStrategy;

/// Contains Config properties which will be used by the Replication Engine
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplicationConfig {
    /// Local player publishes per second
    pub player_sync_rate: f32,
    /// Host NPC publishes per second. Lower than the player rate to bound
    /// write volume.
    pub npc_sync_rate: f32,
    /// How far behind the estimated server time remote entities are rendered
    #[serde(with = "crate::duration_ms")]
    pub interpolation_delay: Duration,
    /// Samples kept per remote entity
    pub max_interpolation_states: usize,
    /// How the host settles remote writes to NPCs it owns
    pub npc_conflict_strategy: ConflictStrategy,
    /// How long a participant's own events stay in the store
    #[serde(with = "crate::duration_ms")]
    pub event_retention: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            player_sync_rate: 10.0,
            npc_sync_rate: 5.0,
            interpolation_delay: Duration::from_millis(100),
            max_interpolation_states: 20,
            npc_conflict_strategy: ConflictStrategy::HostWins,
            event_retention: Duration::from_secs(10),
        }
    }
}
