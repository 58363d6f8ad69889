use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::warn;
use serde_json::{Map, Value};

use super::{
    error::StoreError,
    paths::path_segments,
    remote_store::{
        ChangeListener, CompletionCallback, ListenerId, RemoteStore, ValueCallback,
    },
};

// Upper bound on delivery rounds in one `poll`, in case listeners keep
// writing in response to their own notifications.
const MAX_POLL_ROUNDS: usize = 10_000;

type SharedListener = Arc<dyn Fn(Option<Value>) + Send + Sync>;

enum Delivery {
    Completion(CompletionCallback, Result<(), StoreError>),
    Read(ValueCallback, Result<Option<Value>, StoreError>),
    Notify(ListenerId),
}

struct Listener {
    segments: Vec<String>,
    callback: SharedListener,
}

#[derive(Default)]
struct StoreState {
    root: Map<String, Value>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: ListenerId,
    next_push_id: u64,
    queue: VecDeque<Delivery>,
    notify_pending: HashSet<ListenerId>,
    failing_reads: Vec<Vec<String>>,
    failing_writes: Vec<Vec<String>>,
}

/// In-process [`RemoteStore`].
///
/// Writes are applied immediately, but every callback, read result and
/// change notification is queued until [`InMemoryStore::poll`] is called.
/// Several participants sharing one `InMemoryStore` behave like clients of
/// one backend, with `poll` standing in for network delivery.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers everything queued so far, including deliveries queued by the
    /// callbacks themselves. Returns the number of deliveries made.
    pub fn poll(&self) -> usize {
        let mut delivered = 0;

        for _ in 0..MAX_POLL_ROUNDS {
            let batch: Vec<Delivery> = self.lock().queue.drain(..).collect();
            if batch.is_empty() {
                return delivered;
            }
            for delivery in batch {
                delivered += 1;
                match delivery {
                    Delivery::Completion(callback, result) => callback(result),
                    Delivery::Read(callback, result) => callback(result),
                    Delivery::Notify(listener_id) => {
                        let Some((callback, value)) = self.prepare_notify(listener_id) else {
                            continue;
                        };
                        callback(value);
                    }
                }
            }
        }

        warn!("InMemoryStore: delivery did not settle after {} rounds", MAX_POLL_ROUNDS);
        delivered
    }

    /// Number of deliveries waiting for the next `poll`
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Current value at `path`, read synchronously
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        let state = self.lock();
        read_node(&state.root, &path_segments(path))
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Makes every read at or below `path` fail with [`StoreError::Injected`]
    pub fn fail_reads_under(&self, path: &str) {
        self.lock().failing_reads.push(path_segments(path));
    }

    /// Makes every write at or below `path` fail with [`StoreError::Injected`]
    pub fn fail_writes_under(&self, path: &str) {
        self.lock().failing_writes.push(path_segments(path));
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_reads.clear();
        state.failing_writes.clear();
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prepare_notify(&self, listener_id: ListenerId) -> Option<(SharedListener, Option<Value>)> {
        let mut state = self.lock();
        state.notify_pending.remove(&listener_id);
        let (_, listener) = state.listeners.iter().find(|(id, _)| *id == listener_id)?;
        let callback = listener.callback.clone();
        let value = read_node(&state.root, &listener.segments);
        Some((callback, value))
    }

    /// Applies a batch of writes as one operation. Either all are applied or,
    /// if any target is invalid or failing, none are.
    fn write(
        &self,
        path: &str,
        writes: Vec<(Vec<String>, Option<Value>)>,
        on_complete: Option<CompletionCallback>,
    ) {
        let mut state = self.lock();

        let result = state.check_writes(path, &writes);
        if result.is_ok() {
            for (segments, value) in writes {
                write_node(&mut state.root, &segments, value.and_then(prune));
                state.notify_overlapping(&segments);
            }
        }

        match on_complete {
            Some(callback) => state.queue.push_back(Delivery::Completion(callback, result)),
            None => {
                if let Err(error) = result {
                    warn!("InMemoryStore: unacknowledged write failed: {}", error);
                }
            }
        }
    }
}

impl StoreState {
    fn check_writes(
        &self,
        path: &str,
        writes: &[(Vec<String>, Option<Value>)],
    ) -> Result<(), StoreError> {
        for (segments, _) in writes {
            if segments.is_empty() {
                return Err(StoreError::InvalidPath {
                    path: path.to_string(),
                });
            }
            if is_under_any(segments, &self.failing_writes) {
                return Err(StoreError::Injected {
                    path: segments.join("/"),
                });
            }
        }
        Ok(())
    }

    fn notify_overlapping(&mut self, written: &[String]) {
        let mut woken = Vec::new();
        for (id, listener) in self.listeners.iter() {
            if overlaps(&listener.segments, written) && !self.notify_pending.contains(id) {
                woken.push(*id);
            }
        }
        for id in woken {
            self.notify_pending.insert(id);
            self.queue.push_back(Delivery::Notify(id));
        }
    }
}

impl RemoteStore for InMemoryStore {
    fn set_value(&self, path: &str, value: Value, on_complete: Option<CompletionCallback>) {
        self.write(path, vec![(path_segments(path), Some(value))], on_complete);
    }

    fn update_value(
        &self,
        path: &str,
        partial: Map<String, Value>,
        on_complete: Option<CompletionCallback>,
    ) {
        let base = path_segments(path);
        let writes = partial
            .into_iter()
            .map(|(key, value)| {
                let mut segments = base.clone();
                segments.extend(path_segments(&key));
                (segments, Some(value))
            })
            .collect();
        self.write(path, writes, on_complete);
    }

    fn delete_value(&self, path: &str, on_complete: Option<CompletionCallback>) {
        self.write(path, vec![(path_segments(path), None)], on_complete);
    }

    fn get_value(&self, path: &str, on_result: ValueCallback) {
        let mut state = self.lock();
        let segments = path_segments(path);
        let result = if is_under_any(&segments, &state.failing_reads) {
            Err(StoreError::Injected {
                path: path.to_string(),
            })
        } else {
            Ok(read_node(&state.root, &segments))
        };
        state.queue.push_back(Delivery::Read(on_result, result));
    }

    fn push_value(&self, path: &str, value: Value) -> String {
        let key = {
            let mut state = self.lock();
            let key = format!("-{:016x}", state.next_push_id);
            state.next_push_id += 1;
            key
        };
        self.write(path, vec![(child_segments(path, &key), Some(value))], None);
        key
    }

    fn listen_to_path(&self, path: &str, on_change: ChangeListener) -> ListenerId {
        let mut state = self.lock();
        state.next_listener_id += 1;
        let listener_id = state.next_listener_id;
        state.listeners.push((
            listener_id,
            Listener {
                segments: path_segments(path),
                callback: Arc::from(on_change),
            },
        ));
        state.notify_pending.insert(listener_id);
        state.queue.push_back(Delivery::Notify(listener_id));
        listener_id
    }

    fn stop_listening_by_id(&self, listener_id: ListenerId) {
        let mut state = self.lock();
        state.listeners.retain(|(id, _)| *id != listener_id);
        state.notify_pending.remove(&listener_id);
    }
}

fn child_segments(path: &str, key: &str) -> Vec<String> {
    let mut segments = path_segments(path);
    segments.push(key.to_string());
    segments
}

fn is_under_any(segments: &[String], prefixes: &[Vec<String>]) -> bool {
    prefixes.iter().any(|prefix| segments.starts_with(prefix))
}

// A write at `written` is visible to a listener at `listened` when one path
// contains the other.
fn overlaps(listened: &[String], written: &[String]) -> bool {
    listened.starts_with(written) || written.starts_with(listened)
}

// Nulls and empty objects are not stored.
fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, child)| prune(child).map(|child| (key, child)))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Value::Object(kept))
            }
        }
        other => Some(other),
    }
}

fn read_node(root: &Map<String, Value>, segments: &[String]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return if root.is_empty() {
            None
        } else {
            Some(Value::Object(root.clone()))
        };
    };
    let mut node = root.get(head)?;
    for segment in rest {
        node = node.as_object()?.get(segment)?;
    }
    Some(node.clone())
}

fn write_node(node: &mut Map<String, Value>, segments: &[String], value: Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        match value {
            Some(value) => {
                node.insert(head.clone(), value);
            }
            None => {
                node.remove(head);
            }
        }
        return;
    }

    if value.is_none() && !node.contains_key(head) {
        return;
    }

    let child = node
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        if value.is_none() {
            return;
        }
        *child = Value::Object(Map::new());
    }
    let now_empty = match child {
        Value::Object(child_map) => {
            write_node(child_map, rest, value);
            child_map.is_empty()
        }
        _ => false,
    };
    if now_empty {
        node.remove(head);
    }
}
