use thiserror::Error;

/// Errors reported by a [`RemoteStore`](super::RemoteStore) through its
/// completion callbacks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The path is empty or contains a segment the store cannot address
    #[error("Store path `{path}` is not addressable")]
    InvalidPath { path: String },

    /// The store could not be reached or refused the operation
    #[error("Remote store unavailable: {reason}")]
    Unavailable { reason: String },

    /// Failure injected by a test fixture
    #[error("Injected store failure at `{path}`")]
    Injected { path: String },
}
