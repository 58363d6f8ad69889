mod error;
mod keyed_snapshot;
mod memory_store;
mod paths;
mod remote_store;

pub use error::StoreError;
pub use keyed_snapshot::{KeyedDiff, KeyedSnapshot};
pub use memory_store::InMemoryStore;
pub use paths::{is_valid_key, path_segments, SessionPaths, SESSIONS_ROOT};
pub use remote_store::{
    ChangeListener, CompletionCallback, ListenerId, RemoteStore, ValueCallback,
};
