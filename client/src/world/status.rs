/// Connection state machine of the world store.
///
/// `Disconnected -> Connecting -> Syncing -> Connected`; `Error` is reached
/// from `Connecting` or `Syncing` and only a new connect leaves it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Syncing,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}
