//! # Townsync Client
//! Per-participant state sync for a shared survival town: presence and
//! session membership, host-authoritative entity replication, and the
//! shared tile grid, all carried over a path-addressed remote store.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use townsync_shared::{
        store::{InMemoryStore, RemoteStore, SessionPaths, StoreError},
        wire, Clock, ConflictStrategy, EntityId, GeoPoint, LocationProvider, ManualClock,
        Millis, ParticipantId, SessionId, SystemClock,
    };
}

mod authority;
mod duration_ms;
mod error;
mod participant;
mod presence;
mod replication;
mod session;
mod world;

pub use authority::{authority_channel, AuthorityAccessor, AuthorityData, AuthorityMutator};
pub use error::{ParticipantError, PresenceError, ReplicationError, WorldError};
pub use participant::{Participant, ParticipantConfig};
pub use presence::{
    rank_sessions, summarize_sessions, DiscoveryConfig, HostElection, PresenceConfig,
    PresenceManager, Roster, RosterDiff, RosterSnapshot, SessionDirectory, SessionSummary,
};
pub use replication::{
    InterpolationHistory, ReplicationConfig, ReplicationEngine, ServerTimeEstimator, SyncStats,
};
pub use session::{LocalIdentity, SessionContext};
pub use world::{
    fnv1a, generate_town, seed_for, ConnectionStatus, EntityDiff, EntityDirectory,
    GenerationParams, MapChangeEvent, TileMap, WorldConfig, WorldStore,
};

use std::time::Duration;

use log::warn;

use townsync_shared::store::CompletionCallback;

/// Whole milliseconds in `duration`, saturating.
pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Completion callback for fire-and-continue writes: failures are logged
/// and otherwise dropped.
pub(crate) fn report_write(operation: &'static str) -> CompletionCallback {
    Box::new(move |result| {
        if let Err(error) = result {
            warn!("{} failed: {}", operation, error);
        }
    })
}
