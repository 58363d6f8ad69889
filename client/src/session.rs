use std::sync::Arc;

use townsync_shared::{Clock, Millis, ParticipantId, RemoteStore, SystemClock};

/// Who the local participant is
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalIdentity {
    pub participant_id: ParticipantId,
    pub display_name: String,
}

impl LocalIdentity {
    pub fn new(participant_id: impl Into<ParticipantId>, display_name: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Everything a participant component needs from its surroundings. Each
/// component receives one at construction; nothing is global.
#[derive(Clone)]
pub struct SessionContext {
    identity: LocalIdentity,
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
}

impl SessionContext {
    pub fn new(identity: LocalIdentity, store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            identity,
            store,
            clock,
        }
    }

    /// Context using the wall clock
    pub fn with_system_clock(identity: LocalIdentity, store: Arc<dyn RemoteStore>) -> Self {
        Self::new(identity, store, Arc::new(SystemClock))
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.identity.participant_id
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn now(&self) -> Millis {
        self.clock.now_millis()
    }
}
