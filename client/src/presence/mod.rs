mod config;
mod directory;
mod election;
mod manager;
mod roster;

pub use config::{DiscoveryConfig, PresenceConfig};
pub use directory::{rank_sessions, summarize_sessions, SessionDirectory, SessionSummary};
pub use election::HostElection;
pub use manager::PresenceManager;
pub use roster::{Roster, RosterDiff, RosterSnapshot};
