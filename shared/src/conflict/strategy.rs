use serde::{Deserialize, Serialize};

/// Rule used to pick a winner between two competing writes to the same
/// logical value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictStrategy {
    /// Earlier timestamp wins
    FirstWins,
    /// Later timestamp wins
    #[default]
    LastWins,
    /// The write authored by the session host wins regardless of timestamp
    HostWins,
    /// The lower health wins, so damage always sticks. Entity states only.
    HighestHealthWins,
    /// Latest transform, minimum health, terminal flags OR-ed. Entity
    /// states only.
    Merge,
}

/// Session facts a strategy may need. The policy itself keeps none.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveContext<'a> {
    pub host_id: Option<&'a str>,
}

impl<'a> ResolveContext<'a> {
    pub fn with_host(host_id: Option<&'a str>) -> Self {
        Self { host_id }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winner {
    Current,
    Incoming,
}
