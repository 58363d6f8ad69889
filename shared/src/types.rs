/// Stable identity of a participant across sessions.
pub type ParticipantId = String;
/// Identifier scoping every store path of one session ("town").
pub type SessionId = String;
/// Identifier of a replicated player, NPC or world entity.
pub type EntityId = String;
/// Milliseconds since the UNIX epoch.
pub type Millis = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostRole {
    Host,
    Guest,
}

impl HostRole {
    pub fn from_is_host(is_host: bool) -> Self {
        if is_host {
            HostRole::Host
        } else {
            HostRole::Guest
        }
    }

    pub fn is_host(self) -> bool {
        matches!(self, HostRole::Host)
    }
}
