use townsync_shared::{wire::Tile, ParticipantId};

/// A grid cell changed, locally or by an accepted remote edit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapChangeEvent {
    pub x: i32,
    pub y: i32,
    pub old_tile: Tile,
    pub new_tile: Tile,
    pub changed_by: ParticipantId,
}
