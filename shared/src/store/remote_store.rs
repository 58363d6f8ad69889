use serde_json::{Map, Value};

use super::error::StoreError;

pub type ListenerId = u64;

/// Completion of a write. `Ok(())` once the store has accepted the value.
pub type CompletionCallback = Box<dyn FnOnce(Result<(), StoreError>) + Send>;

/// Result of a read. `Ok(None)` means nothing is stored at the path.
pub type ValueCallback = Box<dyn FnOnce(Result<Option<Value>, StoreError>) + Send>;

/// Change notification carrying the full current value at the listened path.
pub type ChangeListener = Box<dyn Fn(Option<Value>) + Send + Sync>;

/// Path-addressed, eventually-consistent value tree with change notification.
///
/// Paths are `/`-separated segments. No multi-path transactions exist: every
/// call addresses exactly one subtree.
///
/// Implementations must never invoke a callback or listener from inside one
/// of these methods; delivery always happens later, from the store's own
/// execution context. Callers are therefore free to hold their own locks
/// while issuing requests.
pub trait RemoteStore: Send + Sync {
    /// Replaces the subtree at `path`. Writing `Null` deletes it.
    fn set_value(&self, path: &str, value: Value, on_complete: Option<CompletionCallback>);

    /// Merges `partial` into the object at `path`, key by key. Keys may
    /// themselves be multi-segment paths relative to `path`.
    fn update_value(
        &self,
        path: &str,
        partial: Map<String, Value>,
        on_complete: Option<CompletionCallback>,
    );

    fn delete_value(&self, path: &str, on_complete: Option<CompletionCallback>);

    fn get_value(&self, path: &str, on_result: ValueCallback);

    /// Stores `value` under a freshly generated child key of `path` and
    /// returns that key. Keys generated by one store sort in creation order.
    fn push_value(&self, path: &str, value: Value) -> String;

    /// Registers a listener. It receives the current value once, then again
    /// after every write that touches the listened subtree.
    fn listen_to_path(&self, path: &str, on_change: ChangeListener) -> ListenerId;

    fn stop_listening_by_id(&self, listener_id: ListenerId);
}
