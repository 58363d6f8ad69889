use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::election::HostElection;

/// Contains Config properties which will be used by the Presence Manager
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceConfig {
    /// How often the local record is rewritten with a fresh `lastSeen`
    #[serde(with = "crate::duration_ms")]
    pub heartbeat_interval: Duration,
    /// How often the roster is checked for silent participants
    #[serde(with = "crate::duration_ms")]
    pub sweep_interval: Duration,
    /// Age of `lastSeen` after which an online participant is marked offline
    #[serde(with = "crate::duration_ms")]
    pub offline_timeout: Duration,
    /// What happens when the host disappears
    pub host_election: HostElection,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(2),
            offline_timeout: Duration::from_secs(15),
            host_election: HostElection::default(),
        }
    }
}

/// Contains Config properties used when looking for a session to join
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryConfig {
    pub radius_km: f64,
    /// Sessions with fewer participants are skipped
    pub min_players: u32,
    /// Sessions with this many participants or more are skipped
    pub max_players: u32,
    /// Capacity given to sessions created by `get_or_create`
    pub default_capacity: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            radius_km: 5.0,
            min_players: 0,
            max_players: 8,
            default_capacity: 8,
        }
    }
}
