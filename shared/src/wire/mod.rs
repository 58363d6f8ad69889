mod entity_state;
mod error;
mod event;
mod presence;
mod record;
mod session;
mod tile;
mod transform;
mod world_entity;

pub use entity_state::{
    BehaviorState, EntityDetails, EntityState, NpcDetails, PlayerDetails, DEFAULT_HEALTH,
};
pub use error::WireError;
pub use event::{GameEvent, GameEventType};
pub use presence::{PresenceRecord, PresenceStatus};
pub use record::WireRecord;
pub use session::{SessionDescriptor, DEFAULT_CAPACITY};
pub use tile::{MapEditEvent, Tile, TileType};
pub use transform::NetworkTransform;
pub use world_entity::WorldEntity;
