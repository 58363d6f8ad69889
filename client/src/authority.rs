use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use townsync_shared::{HostRole, ParticipantId, SessionId};

/// Creates a connected mutator/accessor pair. The presence manager keeps the
/// mutator; replication and the world store read through accessors.
pub fn authority_channel() -> (AuthorityMutator, AuthorityAccessor) {
    AuthorityChannel::new_channel()
}

// AuthorityChannel
#[derive(Clone)]
struct AuthorityChannel {
    data: Arc<RwLock<AuthorityData>>,
}

impl AuthorityChannel {
    fn new_channel() -> (AuthorityMutator, AuthorityAccessor) {
        let channel = Self {
            data: Arc::new(RwLock::new(AuthorityData::default())),
        };

        let mutator = AuthorityMutator {
            channel: channel.clone(),
        };
        let accessor = AuthorityAccessor { channel };

        (mutator, accessor)
    }

    // Authority data is plain values, so a poisoned lock still holds a
    // usable snapshot.
    fn read(&self) -> RwLockReadGuard<'_, AuthorityData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthorityData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// AuthorityData
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorityData {
    pub session_id: Option<SessionId>,
    pub host_id: Option<ParticipantId>,
    pub role: Option<HostRole>,
}

impl AuthorityData {
    pub fn is_host(&self) -> bool {
        self.role.map_or(false, HostRole::is_host)
    }
}

// AuthorityMutator
pub struct AuthorityMutator {
    channel: AuthorityChannel,
}

impl AuthorityMutator {
    pub fn set_session(&self, session_id: SessionId, role: HostRole) {
        let mut data = self.channel.write();
        data.session_id = Some(session_id);
        data.role = Some(role);
    }

    pub fn set_role(&self, role: HostRole) {
        self.channel.write().role = Some(role);
    }

    pub fn set_host_id(&self, host_id: Option<ParticipantId>) {
        self.channel.write().host_id = host_id;
    }

    pub fn clear(&self) {
        *self.channel.write() = AuthorityData::default();
    }
}

// AuthorityAccessor
#[derive(Clone)]
pub struct AuthorityAccessor {
    channel: AuthorityChannel,
}

impl AuthorityAccessor {
    pub fn snapshot(&self) -> AuthorityData {
        self.channel.read().clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.channel.read().session_id.clone()
    }

    pub fn host_id(&self) -> Option<ParticipantId> {
        self.channel.read().host_id.clone()
    }

    pub fn is_host(&self) -> bool {
        self.channel.read().is_host()
    }
}
