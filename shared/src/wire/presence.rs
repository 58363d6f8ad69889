use serde::{Deserialize, Serialize};

use crate::types::{Millis, ParticipantId};

use super::{
    error::WireError,
    record::{require_key, WireRecord},
    transform::NetworkTransform,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Online,
    Away,
    Busy,
    Offline,
}

/// One participant's entry in the session roster
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceRecord {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub transform: NetworkTransform,
    pub status: PresenceStatus,
    pub last_seen: Millis,
    pub is_host: bool,
}

impl PresenceRecord {
    pub fn new(participant_id: impl Into<ParticipantId>, display_name: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    pub fn is_offline(&self) -> bool {
        self.status == PresenceStatus::Offline
    }

    /// Whether the record counts as present at `now`
    pub fn is_live(&self, now: Millis, offline_timeout_ms: i64) -> bool {
        !self.is_offline() && now - self.last_seen <= offline_timeout_ms
    }
}

impl WireRecord for PresenceRecord {
    fn validate(&self) -> Result<(), WireError> {
        require_key("participantId", &self.participant_id)?;
        self.transform.validate()
    }
}
