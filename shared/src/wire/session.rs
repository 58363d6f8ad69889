use serde::{Deserialize, Serialize};

use crate::{location::GeoPoint, store::is_valid_key, types::{Millis, SessionId}};

use super::{error::WireError, record::WireRecord};

pub const DEFAULT_CAPACITY: u32 = 8;

/// Describes one session ("town"). Stored under `sessions/{id}/metadata`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionDescriptor {
    pub session_id: SessionId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub capacity: u32,
    /// Explicit generation seed. When absent the seed is derived from the
    /// session id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub created_at: Millis,
}

impl Default for SessionDescriptor {
    fn default() -> Self {
        Self {
            session_id: SessionId::new(),
            name: String::new(),
            location: None,
            capacity: DEFAULT_CAPACITY,
            seed: None,
            created_at: 0,
        }
    }
}

impl SessionDescriptor {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        let session_id = session_id.into();
        Self {
            name: session_id.clone(),
            session_id,
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl WireRecord for SessionDescriptor {
    fn validate(&self) -> Result<(), WireError> {
        if !is_valid_key(&self.session_id) {
            return Err(WireError::InvalidField {
                field: "sessionId",
                reason: format!("`{}` is not a usable store key", self.session_id),
            });
        }
        if self.capacity == 0 {
            return Err(WireError::InvalidField {
                field: "capacity",
                reason: "capacity must be at least 1".to_string(),
            });
        }
        if let Some(location) = &self.location {
            if !location.is_valid() {
                return Err(WireError::InvalidField {
                    field: "location",
                    reason: "coordinates out of range".to_string(),
                });
            }
        }
        Ok(())
    }
}
