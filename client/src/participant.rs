use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use townsync_shared::wire::SessionDescriptor;

use crate::{
    authority::{authority_channel, AuthorityAccessor},
    error::ParticipantError,
    presence::{DiscoveryConfig, PresenceConfig, PresenceManager, SessionDirectory},
    replication::{ReplicationConfig, ReplicationEngine},
    session::SessionContext,
    world::{WorldConfig, WorldStore},
};

/// Contains Config properties which will be used by a Participant
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantConfig {
    pub presence: PresenceConfig,
    pub discovery: DiscoveryConfig,
    pub replication: ReplicationConfig,
    pub world: WorldConfig,
}

/// One participant's full sync stack, sharing a single session context.
///
/// The presence manager owns host authority; the replication engine and
/// world store read it through the same channel.
pub struct Participant {
    context: SessionContext,
    authority: AuthorityAccessor,
    directory: SessionDirectory,
    presence: PresenceManager,
    replication: ReplicationEngine,
    world: WorldStore,
}

impl Participant {
    pub fn new(context: SessionContext, config: ParticipantConfig) -> Self {
        let (mutator, accessor) = authority_channel();
        Self {
            directory: SessionDirectory::new(context.clone(), config.discovery),
            presence: PresenceManager::new(context.clone(), config.presence, mutator),
            replication: ReplicationEngine::new(
                context.clone(),
                config.replication,
                accessor.clone(),
            ),
            world: WorldStore::new(context.clone(), config.world, accessor.clone()),
            authority: accessor,
            context,
        }
    }

    /// Joins the session, loads its world, then starts replication.
    /// `on_done` fires once every stage has finished or one has failed; a
    /// failed world load leaves the session again.
    pub fn enter_session<F>(&self, descriptor: SessionDescriptor, on_done: F)
    where
        F: FnOnce(Result<(), ParticipantError>) + Send + 'static,
    {
        let presence = self.presence.clone();
        let replication = self.replication.clone();
        let world = self.world.clone();
        let session_id = descriptor.session_id.clone();

        self.presence
            .join_session(descriptor.clone(), move |joined| {
                if let Err(error) = joined {
                    on_done(Err(error.into()));
                    return;
                }
                world.connect_to_session(descriptor, move |connected| {
                    if !connected {
                        warn!("Participant: world of `{}` unavailable, leaving", session_id);
                        presence.leave_session();
                        on_done(Err(ParticipantError::WorldUnavailable { session_id }));
                        return;
                    }
                    let started = replication.start_sync().map_err(ParticipantError::from);
                    if started.is_ok() {
                        info!("Participant: in session `{}`", session_id);
                    }
                    on_done(started);
                });
            });
    }

    /// Ticks every component once.
    pub fn update(&self, delta: Duration) {
        self.presence.update(delta);
        self.replication.update(delta);
        self.world.update(delta);
    }

    pub fn leave(&self) {
        self.replication.stop_sync();
        self.world.disconnect_from_session();
        self.presence.leave_session();
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn authority(&self) -> &AuthorityAccessor {
        &self.authority
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub fn presence(&self) -> &PresenceManager {
        &self.presence
    }

    pub fn replication(&self) -> &ReplicationEngine {
        &self.replication
    }

    pub fn world(&self) -> &WorldStore {
        &self.world
    }
}
