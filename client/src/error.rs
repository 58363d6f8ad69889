use thiserror::Error;

use townsync_shared::{store::StoreError, wire::WireError, EntityId, SessionId};

/// Reasons a join or discovery request did not succeed
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("Not joined to any session")]
    NotJoined,

    #[error("Session `{session_id}` is full ({present}/{capacity} participants present)")]
    CapacityFull {
        session_id: SessionId,
        capacity: u32,
        present: u32,
    },

    #[error("Session descriptor for `{session_id}` is invalid: {reason}")]
    InvalidDescriptor {
        session_id: SessionId,
        reason: String,
    },

    #[error("Device location is unavailable")]
    LocationUnavailable,

    #[error("Request was superseded by a later join or leave")]
    Superseded,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Reasons a replication call was rejected
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("Replication is not running for any session")]
    NotJoined,

    #[error("`{operation}` requires host authority")]
    NotHost { operation: &'static str },

    #[error("Entity `{id}` is not known to this participant")]
    UnknownEntity { id: EntityId },

    #[error("Entity `{id}` is already dead")]
    AlreadyDead { id: EntityId },

    #[error("Entity `{id}` is not an NPC")]
    WrongKind { id: EntityId },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Reasons a world-grid or world-entity operation failed
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("Not connected to any session")]
    NotConnected,

    #[error("Tile ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },

    #[error("World entity `{id}` does not exist")]
    UnknownEntity { id: EntityId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Reasons a participant could not enter a session
#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error("World state of session `{session_id}` could not be loaded")]
    WorldUnavailable { session_id: SessionId },

    #[error(transparent)]
    Replication(#[from] ReplicationError),
}
