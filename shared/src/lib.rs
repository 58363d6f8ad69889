//! # Townsync Shared
//! Common functionality shared between the participant components of a
//! townsync session: the remote store contract, wire records, and the
//! conflict resolution policy.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod backends;
mod callbacks;
mod conflict;
mod liveness;
mod location;
mod types;

pub mod store;
pub mod wire;

pub use backends::{Clock, ManualClock, SystemClock, TimeError, Timer, Timestamp};
pub use callbacks::CallbackList;
pub use conflict::{
    pick_winner, resolve_entity_state, resolve_map_edit, ConflictStrategy, Contested,
    ResolveContext, Winner,
};
pub use liveness::{LivenessGuard, SessionLiveness};
pub use location::{FixedLocation, GeoPoint, LocationCallback, LocationProvider};
pub use store::{
    InMemoryStore, KeyedDiff, KeyedSnapshot, ListenerId, RemoteStore, SessionPaths, StoreError,
};
pub use types::{EntityId, HostRole, Millis, ParticipantId, SessionId};
pub use wire::{
    BehaviorState, EntityDetails, EntityState, GameEvent, GameEventType, MapEditEvent,
    NetworkTransform, NpcDetails, PlayerDetails, PresenceRecord, PresenceStatus,
    SessionDescriptor, Tile, TileType, WireError, WireRecord, WorldEntity,
};
