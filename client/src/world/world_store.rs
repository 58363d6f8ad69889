use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, info, warn};
use serde_json::Value;

use townsync_shared::{
    resolve_map_edit,
    store::{ListenerId, SessionPaths, StoreError},
    wire::{MapEditEvent, SessionDescriptor, Tile, WireRecord, WorldEntity},
    CallbackList, EntityId, LivenessGuard, ResolveContext, SessionLiveness, Timer, Winner,
};

use crate::{
    authority::AuthorityAccessor, error::WorldError, report_write, session::SessionContext,
};

use super::{
    config::WorldConfig,
    entities::{EntityDiff, EntityDirectory},
    generation::{generate_town, seed_for},
    map_change::MapChangeEvent,
    status::ConnectionStatus,
    tile_map::TileMap,
};

/// Shared world-state store for one participant.
///
/// Holds the session's tile grid and world-entity directory, bootstraps them
/// from the remote store on connect (generating the town when nothing is
/// persisted), and reconciles remote tile edits through the conflict policy.
#[derive(Clone)]
pub struct WorldStore {
    inner: Arc<WorldInner>,
}

struct WorldInner {
    context: SessionContext,
    config: WorldConfig,
    authority: AuthorityAccessor,
    liveness: SessionLiveness,
    state: Mutex<WorldState>,
    on_map_changed: CallbackList<MapChangeEvent>,
    on_entity_spawned: CallbackList<WorldEntity>,
    on_entity_removed: CallbackList<str>,
    on_status_changed: CallbackList<ConnectionStatus>,
}

struct ConnectedSession {
    descriptor: SessionDescriptor,
    paths: SessionPaths,
    listeners: Vec<ListenerId>,
}

struct WorldState {
    status: ConnectionStatus,
    session: Option<ConnectedSession>,
    map: TileMap,
    entities: EntityDirectory,
    edit_log: HashMap<(i32, i32), MapEditEvent>,
    autosave: Timer,
}

enum Notice {
    Status(ConnectionStatus),
    MapChanged(MapChangeEvent),
    Spawned(WorldEntity),
    Removed(EntityId),
}

/// Where the grid came from during bootstrap
enum GridSource {
    Stored(TileMap, Vec<MapEditEvent>),
    Generated { persist: bool },
}

impl WorldStore {
    pub fn new(context: SessionContext, config: WorldConfig, authority: AuthorityAccessor) -> Self {
        let state = WorldState {
            status: ConnectionStatus::Disconnected,
            session: None,
            map: TileMap::new(0, 0),
            entities: EntityDirectory::new(),
            edit_log: HashMap::new(),
            autosave: Timer::new(config.autosave_interval),
        };

        Self {
            inner: Arc::new(WorldInner {
                context,
                config,
                authority,
                liveness: SessionLiveness::new(),
                state: Mutex::new(state),
                on_map_changed: CallbackList::new(),
                on_entity_spawned: CallbackList::new(),
                on_entity_removed: CallbackList::new(),
                on_status_changed: CallbackList::new(),
            }),
        }
    }

    // Connection lifecycle

    /// Connects to the session described by `descriptor`, disconnecting from
    /// any current one. `on_done` receives `true` once both the grid and the
    /// entity directory are loaded and the store is `Connected`.
    pub fn connect_to_session<F>(&self, descriptor: SessionDescriptor, on_done: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.disconnect_from_session();

        let guard = self.inner.liveness.begin();
        let paths = SessionPaths::new(&descriptor.session_id);
        let valid = descriptor.validate();
        let mut notices = Vec::new();
        {
            let mut state = self.inner.lock();
            set_status(&mut state, ConnectionStatus::Connecting, &mut notices);
            match &valid {
                Ok(()) => {
                    state.session = Some(ConnectedSession {
                        descriptor: descriptor.clone(),
                        paths: paths.clone(),
                        listeners: Vec::new(),
                    });
                }
                Err(error) => {
                    warn!("WorldStore: refusing to connect: {}", error);
                    set_status(&mut state, ConnectionStatus::Error, &mut notices);
                }
            }
        }
        self.inner.dispatch(notices);
        if valid.is_err() {
            self.inner.liveness.end();
            on_done(false);
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        self.inner.context.store().get_value(
            &paths.map(),
            Box::new(move |result| {
                let Some(inner) = weak.upgrade() else {
                    on_done(false);
                    return;
                };
                inner.on_grid_loaded(guard, descriptor, result, on_done);
            }),
        );
    }

    /// Stops listeners, forgets grid and entities and returns to
    /// `Disconnected`.
    pub fn disconnect_from_session(&self) {
        let mut notices = Vec::new();
        {
            let mut state = self.inner.lock();
            if let Some(session) = state.session.take() {
                self.inner.stop_listeners(&session);
                info!(
                    "WorldStore: disconnected from `{}`",
                    session.descriptor.session_id
                );
            }
            state.map = TileMap::new(0, 0);
            state.entities.clear();
            state.edit_log.clear();
            set_status(&mut state, ConnectionStatus::Disconnected, &mut notices);
        }
        self.inner.liveness.end();
        self.inner.dispatch(notices);
    }

    /// Flushes the grid when the autosave timer rings and tiles are dirty.
    pub fn update(&self, delta: Duration) {
        let mut state = self.inner.lock();
        if !state.status.is_connected() {
            return;
        }
        state.autosave.tick(delta);
        if !state.autosave.ringing() {
            return;
        }
        state.autosave.reset();
        if state.map.is_dirty() {
            debug!("WorldStore: autosaving {} dirty tiles", state.map.dirty().len());
            self.inner.flush_grid(&mut state);
        }
    }

    // Grid

    /// Tile at `(x, y)`, or `Tile::EMPTY` outside the grid.
    pub fn get_tile(&self, x: i32, y: i32) -> Tile {
        self.inner.lock().map.get(x, y)
    }

    /// Writes a tile locally and marks it dirty. Returns `false` when the
    /// coordinate is outside the grid.
    pub fn set_tile(&self, x: i32, y: i32, tile: Tile) -> bool {
        self.inner.lock().map.set(x, y, tile).is_some()
    }

    /// Writes the whole grid to the store and clears the dirty set.
    pub fn save_changes(&self) -> Result<(), WorldError> {
        let mut state = self.inner.lock();
        if state.session.is_none() {
            return Err(WorldError::NotConnected);
        }
        self.inner.flush_grid(&mut state);
        Ok(())
    }

    /// Applies a tile locally and publishes it as a single edit so other
    /// participants see it before the next full flush.
    pub fn save_tile_change(&self, x: i32, y: i32, tile: Tile) -> Result<(), WorldError> {
        let local_id = self.inner.context.participant_id().clone();
        let mut notices = Vec::new();
        {
            let mut state = self.inner.lock();
            let Some(path) = state.session.as_ref().map(|session| session.paths.map_change(x, y))
            else {
                return Err(WorldError::NotConnected);
            };
            if !state.map.in_bounds(x, y) {
                return Err(WorldError::OutOfBounds {
                    x,
                    y,
                    width: state.map.width(),
                    height: state.map.height(),
                });
            }

            let edit = MapEditEvent {
                x,
                y,
                tile,
                edited_by: local_id.clone(),
                timestamp: self.inner.context.now(),
            };
            let value = edit.to_value()?;

            let old_tile = state.map.get(x, y);
            state.map.set(x, y, tile);
            state.edit_log.insert((x, y), edit);
            self.inner
                .context
                .store()
                .set_value(&path, value, Some(report_write("tile edit")));

            if old_tile != tile {
                notices.push(Notice::MapChanged(MapChangeEvent {
                    x,
                    y,
                    old_tile,
                    new_tile: tile,
                    changed_by: local_id,
                }));
            }
        }
        self.inner.dispatch(notices);
        Ok(())
    }

    /// Copy of the current grid.
    pub fn map(&self) -> TileMap {
        self.inner.lock().map.clone()
    }

    pub fn dirty_count(&self) -> usize {
        self.inner.lock().map.dirty().len()
    }

    // Entities

    /// Adds an entity, assigning a fresh id when `entity.id` is empty or
    /// already taken. Returns the id it was stored under.
    pub fn spawn_entity(&self, mut entity: WorldEntity) -> Result<EntityId, WorldError> {
        let mut notices = Vec::new();
        let id = {
            let mut state = self.inner.lock();
            let Some(paths) = state.session.as_ref().map(|session| session.paths.clone()) else {
                return Err(WorldError::NotConnected);
            };
            if entity.id.is_empty() || state.entities.contains(&entity.id) {
                entity.id = fresh_entity_id(&state.entities);
            }
            let id = entity.id.clone();
            let value = state.entities.insert_local(entity.clone())?;
            self.inner.context.store().set_value(
                &paths.entity(&id),
                value,
                Some(report_write("entity spawn")),
            );
            notices.push(Notice::Spawned(entity));
            id
        };
        self.inner.dispatch(notices);
        Ok(id)
    }

    pub fn update_entity(&self, entity: WorldEntity) -> Result<(), WorldError> {
        let mut state = self.inner.lock();
        let Some(paths) = state.session.as_ref().map(|session| session.paths.clone()) else {
            return Err(WorldError::NotConnected);
        };
        if !state.entities.contains(&entity.id) {
            return Err(WorldError::UnknownEntity { id: entity.id });
        }
        let id = entity.id.clone();
        let value = state.entities.insert_local(entity)?;
        self.inner.context.store().set_value(
            &paths.entity(&id),
            value,
            Some(report_write("entity update")),
        );
        Ok(())
    }

    pub fn remove_entity(&self, id: &str) -> Result<(), WorldError> {
        {
            let mut state = self.inner.lock();
            let Some(paths) = state.session.as_ref().map(|session| session.paths.clone()) else {
                return Err(WorldError::NotConnected);
            };
            if state.entities.remove_local(id).is_none() {
                return Err(WorldError::UnknownEntity { id: id.to_string() });
            }
            self.inner.context.store().delete_value(
                &paths.entity(&id.to_string()),
                Some(report_write("entity removal")),
            );
        }
        self.inner.on_entity_removed.emit(id);
        Ok(())
    }

    pub fn get_entities(&self) -> Vec<WorldEntity> {
        self.inner.lock().entities.all().cloned().collect()
    }

    pub fn get_entity(&self, id: &str) -> Option<WorldEntity> {
        self.inner.lock().entities.get(id).cloned()
    }

    // Queries

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn descriptor(&self) -> Option<SessionDescriptor> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|session| session.descriptor.clone())
    }

    // Callbacks

    pub fn on_map_changed(&self, handler: impl Fn(&MapChangeEvent) + Send + Sync + 'static) {
        self.inner.on_map_changed.register(handler);
    }

    pub fn on_entity_spawned(&self, handler: impl Fn(&WorldEntity) + Send + Sync + 'static) {
        self.inner.on_entity_spawned.register(handler);
    }

    pub fn on_entity_removed(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.inner.on_entity_removed.register(handler);
    }

    pub fn on_status_changed(&self, handler: impl Fn(&ConnectionStatus) + Send + Sync + 'static) {
        self.inner.on_status_changed.register(handler);
    }
}

impl WorldInner {
    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Bootstrap

    fn on_grid_loaded<F>(
        self: &Arc<Self>,
        guard: LivenessGuard,
        descriptor: SessionDescriptor,
        result: Result<Option<Value>, StoreError>,
        on_done: F,
    ) where
        F: FnOnce(bool) + Send + 'static,
    {
        if !guard.is_live() {
            debug!("WorldStore: connect to `{}` superseded", descriptor.session_id);
            on_done(false);
            return;
        }

        let source = match result {
            Ok(Some(value)) => match TileMap::from_value(&value) {
                Ok(map) => GridSource::Stored(map, parse_edits(value.get("changes"))),
                Err(error) => {
                    warn!(
                        "WorldStore: stored grid of `{}` is malformed ({}), regenerating",
                        descriptor.session_id, error
                    );
                    GridSource::Generated { persist: true }
                }
            },
            Ok(None) => {
                info!(
                    "WorldStore: no grid stored for `{}`, generating",
                    descriptor.session_id
                );
                GridSource::Generated { persist: true }
            }
            Err(error) => {
                warn!(
                    "WorldStore: cannot load grid of `{}` ({}), generating locally",
                    descriptor.session_id, error
                );
                GridSource::Generated { persist: false }
            }
        };

        let entities_path = {
            let mut notices = Vec::new();
            let mut state = self.lock();
            let Some(paths) = state.session.as_ref().map(|session| session.paths.clone()) else {
                drop(state);
                on_done(false);
                return;
            };
            match source {
                GridSource::Stored(map, edits) => {
                    state.map = map;
                    for edit in edits {
                        if state.map.set_clean(edit.x, edit.y, edit.tile).is_some() {
                            state.edit_log.insert((edit.x, edit.y), edit);
                        }
                    }
                }
                GridSource::Generated { persist } => {
                    let seed = seed_for(&descriptor);
                    state.map = generate_town(
                        self.config.width,
                        self.config.height,
                        seed,
                        &self.config.generation,
                    );
                    debug!(
                        "WorldStore: generated {}x{} town from seed {:#x}",
                        self.config.width, self.config.height, seed
                    );
                    if persist {
                        self.flush_grid(&mut state);
                    }
                }
            }
            set_status(&mut state, ConnectionStatus::Syncing, &mut notices);
            drop(state);
            self.dispatch(notices);
            paths.entities()
        };

        let weak = Arc::downgrade(self);
        self.context.store().get_value(
            &entities_path,
            Box::new(move |result| {
                let Some(inner) = weak.upgrade() else {
                    on_done(false);
                    return;
                };
                inner.on_entities_loaded(guard, result, on_done);
            }),
        );
    }

    fn on_entities_loaded<F>(
        self: &Arc<Self>,
        guard: LivenessGuard,
        result: Result<Option<Value>, StoreError>,
        on_done: F,
    ) where
        F: FnOnce(bool) + Send + 'static,
    {
        if !guard.is_live() {
            on_done(false);
            return;
        }

        let mut notices = Vec::new();
        let connected = {
            let mut guard_state = self.lock();
            let state = &mut *guard_state;
            match result {
                Ok(value) => {
                    let Some(session) = state.session.as_mut() else {
                        return on_done(false);
                    };
                    state.entities.apply_snapshot(value.as_ref());
                    session.listeners = vec![
                        self.listen(&session.paths.map_changes(), &guard, WorldInner::ingest_edits),
                        self.listen(&session.paths.entities(), &guard, WorldInner::ingest_entities),
                    ];
                    info!(
                        "WorldStore: connected to `{}` ({} entities)",
                        session.descriptor.session_id,
                        state.entities.len()
                    );
                    state.autosave.reset();
                    set_status(state, ConnectionStatus::Connected, &mut notices);
                    true
                }
                Err(error) => {
                    warn!("WorldStore: cannot load world entities: {}", error);
                    if let Some(session) = state.session.take() {
                        self.stop_listeners(&session);
                    }
                    set_status(state, ConnectionStatus::Error, &mut notices);
                    false
                }
            }
        };

        if !connected {
            self.liveness.end();
        }
        self.dispatch(notices);
        on_done(connected);
    }

    fn listen(
        self: &Arc<Self>,
        path: &str,
        guard: &LivenessGuard,
        ingest: fn(&WorldInner, Option<&Value>),
    ) -> ListenerId {
        let weak = Arc::downgrade(self);
        let guard = guard.clone();
        self.context.store().listen_to_path(
            path,
            Box::new(move |value| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if guard.is_live() {
                    ingest(inner.as_ref(), value.as_ref());
                }
            }),
        )
    }

    fn stop_listeners(&self, session: &ConnectedSession) {
        let store = self.context.store();
        for listener in &session.listeners {
            store.stop_listening_by_id(*listener);
        }
    }

    // Ingest

    fn ingest_edits(&self, value: Option<&Value>) {
        let local_id = self.context.participant_id();
        let host_id = self.authority.host_id();
        let resolve_context = ResolveContext::with_host(host_id.as_deref());
        let strategy = self.config.tile_conflict_strategy;

        let mut notices = Vec::new();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.session.is_none() {
                return;
            }
            for incoming in parse_edits(value) {
                if incoming.edited_by == *local_id {
                    continue;
                }
                if !state.map.in_bounds(incoming.x, incoming.y) {
                    warn!(
                        "WorldStore: ignoring edit outside the grid at ({}, {})",
                        incoming.x, incoming.y
                    );
                    continue;
                }
                let coordinate = (incoming.x, incoming.y);
                if let Some(current) = state.edit_log.get(&coordinate) {
                    if resolve_map_edit(current, &incoming, strategy, &resolve_context)
                        == Winner::Current
                    {
                        continue;
                    }
                }

                let old_tile = state.map.get(incoming.x, incoming.y);
                state.map.set_clean(incoming.x, incoming.y, incoming.tile);
                if old_tile != incoming.tile {
                    notices.push(Notice::MapChanged(MapChangeEvent {
                        x: incoming.x,
                        y: incoming.y,
                        old_tile,
                        new_tile: incoming.tile,
                        changed_by: incoming.edited_by.clone(),
                    }));
                }
                state.edit_log.insert(coordinate, incoming);
            }
        }
        self.dispatch(notices);
    }

    fn ingest_entities(&self, value: Option<&Value>) {
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            if state.session.is_none() {
                return;
            }
            let EntityDiff {
                spawned, removed, ..
            } = state.entities.apply_snapshot(value);
            notices.extend(spawned.into_iter().map(Notice::Spawned));
            notices.extend(removed.into_iter().map(Notice::Removed));
        }
        self.dispatch(notices);
    }

    // Persistence

    fn flush_grid(&self, state: &mut WorldState) {
        let Some(session) = &state.session else {
            return;
        };
        // The flushed grid already holds every edit applied so far, so the
        // single-tile edits are dropped with it.
        let mut fields = state.map.to_fields();
        fields.insert("changes".to_string(), Value::Null);
        self.context.store().update_value(
            &session.paths.map(),
            fields,
            Some(report_write("grid flush")),
        );
        state.map.clear_dirty();
    }

    fn dispatch(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::Status(status) => self.on_status_changed.emit(&status),
                Notice::MapChanged(change) => self.on_map_changed.emit(&change),
                Notice::Spawned(entity) => self.on_entity_spawned.emit(&entity),
                Notice::Removed(id) => self.on_entity_removed.emit(id.as_str()),
            }
        }
    }
}

fn set_status(state: &mut WorldState, status: ConnectionStatus, notices: &mut Vec<Notice>) {
    if state.status != status {
        debug!("WorldStore: {:?} -> {:?}", state.status, status);
        state.status = status;
        notices.push(Notice::Status(status));
    }
}

/// Edits stored under `map/changes`, oldest first. Malformed entries are
/// skipped.
fn parse_edits(value: Option<&Value>) -> Vec<MapEditEvent> {
    let Some(Value::Object(children)) = value else {
        return Vec::new();
    };
    let mut edits: Vec<MapEditEvent> = children
        .iter()
        .filter_map(|(key, child)| match MapEditEvent::from_value(child) {
            Ok(edit) => Some(edit),
            Err(error) => {
                warn!("WorldStore: skipping malformed tile edit `{}`: {}", key, error);
                None
            }
        })
        .collect();
    edits.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.edited_by.cmp(&b.edited_by))
    });
    edits
}

fn fresh_entity_id(entities: &EntityDirectory) -> EntityId {
    loop {
        let id = format!("entity_{:016x}", fastrand::u64(..));
        if !entities.contains(&id) {
            return id;
        }
    }
}
