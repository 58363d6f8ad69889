use std::time::Duration;

use serde::{Deserialize, Serialize};

use townsync_shared::ConflictStrategy;

use super::generation::GenerationParams;

/// Contains Config properties which will be used by the World Store
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldConfig {
    /// Grid width used when a town has to be generated
    pub width: i32,
    /// Grid height used when a town has to be generated
    pub height: i32,
    /// How often a dirty grid is flushed while connected
    #[serde(with = "crate::duration_ms")]
    pub autosave_interval: Duration,
    /// How concurrent edits of one tile are settled
    pub tile_conflict_strategy: ConflictStrategy,
    pub generation: GenerationParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            autosave_interval: Duration::from_secs(30),
            tile_conflict_strategy: ConflictStrategy::LastWins,
            generation: GenerationParams::default(),
        }
    }
}
