use serde::{Deserialize, Serialize};

/// Policy applied when the roster has no present host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostElection {
    /// Nobody takes over. NPCs stop updating until a new session starts.
    Disabled,
    /// The present participant with the lowest id becomes host. Every
    /// participant evaluates the same rule over the same roster, so at most
    /// one of them elects itself once their views agree.
    #[default]
    LowestIdOnline,
}

impl HostElection {
    pub fn elect<'a>(self, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        match self {
            HostElection::Disabled => None,
            HostElection::LowestIdOnline => candidates.into_iter().min(),
        }
    }
}
