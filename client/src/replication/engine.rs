use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, info, warn};
use serde_json::{json, Map, Value};

use townsync_shared::{
    resolve_entity_state,
    store::{ListenerId, SessionPaths},
    wire::{EntityState, GameEvent, GameEventType, WireRecord},
    CallbackList, EntityId, Millis, ResolveContext, SessionId, SessionLiveness, Timer,
};

use crate::{
    authority::AuthorityAccessor, duration_millis, error::ReplicationError, report_write,
    session::SessionContext,
};

use super::{
    config::ReplicationConfig,
    history::InterpolationHistory,
    stats::{StatsCounters, SyncStats},
    time::ServerTimeEstimator,
};

const STATS_WINDOW: Duration = Duration::from_secs(1);

/// Entity state replication for one participant.
///
/// Publishes the local player (and, on the host, every live NPC) at fixed
/// rates, interpolates remote entities for presentation, and fans out
/// one-shot game events. Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct ReplicationEngine {
    inner: Arc<ReplicationInner>,
}

struct ReplicationInner {
    context: SessionContext,
    config: ReplicationConfig,
    authority: AuthorityAccessor,
    liveness: SessionLiveness,
    state: Mutex<ReplicationState>,
    on_game_event: CallbackList<GameEvent>,
    on_player_state_changed: CallbackList<EntityState>,
    on_npc_state_changed: CallbackList<EntityState>,
}

struct ActiveSync {
    session_id: SessionId,
    paths: SessionPaths,
    listeners: Vec<ListenerId>,
    started_at: Millis,
}

struct ReplicationState {
    sync: Option<ActiveSync>,
    acting_host: bool,
    local_player: Option<EntityState>,
    local_player_dirty: bool,
    players: HashMap<EntityId, InterpolationHistory>,
    npcs: HashMap<EntityId, InterpolationHistory>,
    owned_npcs: BTreeMap<EntityId, EntityState>,
    seen_events: HashSet<String>,
    pending_events: VecDeque<GameEvent>,
    /// Keys and timestamps of events this participant pushed, oldest first
    own_events: VecDeque<(String, Millis)>,
    player_timer: Timer,
    npc_timer: Timer,
    stats_timer: Timer,
    clock_sync: ServerTimeEstimator,
    counters: StatsCounters,
    stats: SyncStats,
}

enum Notice {
    PlayerChanged(EntityState),
    NpcChanged(EntityState),
}

type IngestFn = fn(&ReplicationInner, Option<&Value>);

impl ReplicationEngine {
    pub fn new(
        context: SessionContext,
        config: ReplicationConfig,
        authority: AuthorityAccessor,
    ) -> Self {
        let state = ReplicationState {
            sync: None,
            acting_host: false,
            local_player: None,
            local_player_dirty: false,
            players: HashMap::new(),
            npcs: HashMap::new(),
            owned_npcs: BTreeMap::new(),
            seen_events: HashSet::new(),
            pending_events: VecDeque::new(),
            own_events: VecDeque::new(),
            player_timer: Timer::from_rate(config.player_sync_rate),
            npc_timer: Timer::from_rate(config.npc_sync_rate),
            stats_timer: Timer::new(STATS_WINDOW),
            clock_sync: ServerTimeEstimator::new(),
            counters: StatsCounters::default(),
            stats: SyncStats::default(),
        };

        Self {
            inner: Arc::new(ReplicationInner {
                context,
                config,
                authority,
                liveness: SessionLiveness::new(),
                state: Mutex::new(state),
                on_game_event: CallbackList::new(),
                on_player_state_changed: CallbackList::new(),
                on_npc_state_changed: CallbackList::new(),
            }),
        }
    }

    // Lifecycle

    /// Starts publishing and subscribing for the session the authority
    /// channel currently names.
    pub fn start_sync(&self) -> Result<(), ReplicationError> {
        let session_id = self
            .inner
            .authority
            .session_id()
            .ok_or(ReplicationError::NotJoined)?;

        {
            let state = self.inner.lock();
            if let Some(sync) = &state.sync {
                if sync.session_id == session_id {
                    return Ok(());
                }
            }
        }
        self.stop_sync();

        self.inner.liveness.begin();
        let paths = SessionPaths::new(&session_id);
        let listeners = vec![
            self.inner
                .listen(&paths.sync_players(), ReplicationInner::ingest_players),
            self.inner
                .listen(&paths.sync_npcs(), ReplicationInner::ingest_npcs),
            self.inner
                .listen(&paths.sync_events(), ReplicationInner::ingest_events),
        ];

        let mut state = self.inner.lock();
        let started_at = state.clock_sync.estimate(self.inner.context.now());
        state.sync = Some(ActiveSync {
            session_id: session_id.clone(),
            paths,
            listeners,
            started_at,
        });
        state.acting_host = self.inner.authority.is_host();
        state.local_player_dirty = state.local_player.is_some();
        state.player_timer.reset();
        state.npc_timer.reset();
        state.stats_timer.reset();

        info!(
            "ReplicationEngine: syncing session `{}` as {}",
            session_id,
            if state.acting_host { "host" } else { "guest" }
        );
        Ok(())
    }

    /// Stops every listener and forgets all replicated state.
    pub fn stop_sync(&self) {
        let mut state = self.inner.lock();
        let Some(sync) = state.sync.take() else {
            return;
        };
        self.inner.liveness.end();
        for listener_id in sync.listeners {
            self.inner.context.store().stop_listening_by_id(listener_id);
        }
        state.players.clear();
        state.npcs.clear();
        state.owned_npcs.clear();
        state.seen_events.clear();
        state.pending_events.clear();
        state.own_events.clear();
        state.acting_host = false;
        state.stats = SyncStats::default();
        state.counters = StatsCounters::default();
        info!("ReplicationEngine: stopped syncing `{}`", sync.session_id);
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.lock().sync.is_some()
    }

    /// Publishes, interpolates and dispatches pending events.
    pub fn update(&self, delta: Duration) {
        let events: Vec<GameEvent> = {
            let mut state = self.inner.lock();
            if state.sync.is_none() {
                return;
            }
            let inner = &self.inner;
            inner.sync_role(&mut state);
            let now = inner.server_time(&state);

            state.player_timer.tick(delta);
            state.npc_timer.tick(delta);
            state.stats_timer.tick(delta);

            if state.player_timer.ringing() {
                state.player_timer.reset();
                inner.publish_local_player(&mut state);
            }

            if state.npc_timer.ringing() {
                state.npc_timer.reset();
                if state.acting_host {
                    inner.publish_owned_npcs(&mut state, now);
                }
            }

            inner.expire_own_events(&mut state, now);

            let target = now - duration_millis(inner.config.interpolation_delay);
            for history in state.players.values_mut() {
                history.interpolate(target);
            }
            if !state.acting_host {
                for history in state.npcs.values_mut() {
                    history.interpolate(target);
                }
            }

            if state.stats_timer.ringing() {
                let window = state.stats_timer.duration();
                state.stats_timer.reset();
                let ReplicationState {
                    counters,
                    stats,
                    players,
                    npcs,
                    owned_npcs,
                    clock_sync,
                    acting_host,
                    ..
                } = &mut *state;
                counters.roll(window, stats);
                stats.tracked_players = players.len();
                stats.tracked_npcs = if *acting_host { owned_npcs.len() } else { npcs.len() };
                stats.estimated_latency_ms = clock_sync.latency();
            }

            state.pending_events.drain(..).collect()
        };

        for event in events {
            self.inner.on_game_event.emit(&event);
        }
    }

    // Players

    /// Buffers the local player's state for the next publish tick, stamped
    /// with the estimated server time.
    pub fn set_local_player_state(&self, mut player: EntityState) {
        let mut state = self.inner.lock();
        let now = self.inner.server_time(&state);
        player.id = self.inner.context.participant_id().clone();
        player.authored_by = Some(self.inner.context.participant_id().clone());
        player.transform.timestamp = now;
        state.local_player = Some(player);
        state.local_player_dirty = true;
    }

    /// Interpolated state of a player. The local player is returned as last
    /// set.
    pub fn get_player_state(&self, id: &str) -> Option<EntityState> {
        let state = self.inner.lock();
        if id == self.inner.context.participant_id() {
            return state.local_player.clone();
        }
        state
            .players
            .get(id)
            .and_then(InterpolationHistory::interpolated)
            .cloned()
    }

    pub fn get_all_player_states(&self) -> Vec<EntityState> {
        let state = self.inner.lock();
        let mut players: Vec<EntityState> = state
            .players
            .values()
            .filter_map(InterpolationHistory::interpolated)
            .cloned()
            .chain(state.local_player.clone())
            .collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        players
    }

    // NPCs

    /// On the host the authoritative state, elsewhere the interpolated one.
    pub fn get_npc_state(&self, id: &str) -> Option<EntityState> {
        let mut state = self.inner.lock();
        self.inner.sync_role(&mut state);
        if state.acting_host {
            state.owned_npcs.get(id).cloned()
        } else {
            state
                .npcs
                .get(id)
                .and_then(InterpolationHistory::interpolated)
                .cloned()
        }
    }

    pub fn get_all_npc_states(&self) -> Vec<EntityState> {
        let mut state = self.inner.lock();
        self.inner.sync_role(&mut state);
        let mut npcs: Vec<EntityState> = if state.acting_host {
            state.owned_npcs.values().cloned().collect()
        } else {
            state
                .npcs
                .values()
                .filter_map(InterpolationHistory::interpolated)
                .cloned()
                .collect()
        };
        npcs.sort_by(|a, b| a.id.cmp(&b.id));
        npcs
    }

    /// Host only. Replaces the authoritative state of a known NPC; it goes
    /// out with the next NPC publish. A terminal state is published at once,
    /// and moving a live NPC into it emits `NpcDied`.
    pub fn set_npc_state(&self, mut npc: EntityState) -> Result<(), ReplicationError> {
        let mut state = self.inner.lock();
        self.inner.require_host(&mut state, "set_npc_state")?;
        if !npc.is_npc() {
            return Err(ReplicationError::WrongKind { id: npc.id });
        }
        let Some(current) = state.owned_npcs.get(&npc.id) else {
            return Err(ReplicationError::UnknownEntity { id: npc.id });
        };
        let dies = npc.is_terminal() && !current.is_terminal();
        self.inner.stamp(&state, &mut npc);
        if !npc.is_terminal() {
            state.owned_npcs.insert(npc.id.clone(), npc);
            return Ok(());
        }

        npc.mark_dead();
        state.owned_npcs.insert(npc.id.clone(), npc.clone());
        if dies {
            let killer_id = npc
                .npc_details()
                .and_then(|details| details.last_damaged_by.clone())
                .unwrap_or_else(|| self.inner.context.participant_id().clone());
            self.inner.announce_death(&mut state, &npc, &killer_id, None)?;
        } else {
            self.inner.publish_npc(&state, &npc);
        }
        Ok(())
    }

    /// Host only. Registers and publishes a new NPC, returning its id. An
    /// empty or already used id is replaced by a generated one.
    pub fn spawn_npc(&self, mut npc: EntityState) -> Result<EntityId, ReplicationError> {
        let mut state = self.inner.lock();
        self.inner.require_host(&mut state, "spawn_npc")?;
        if !npc.is_npc() {
            return Err(ReplicationError::WrongKind { id: npc.id });
        }
        if npc.id.is_empty() || state.owned_npcs.contains_key(&npc.id) {
            npc.id = generate_npc_id(&state.owned_npcs);
        }
        self.inner.stamp(&state, &mut npc);
        npc.validate()?;

        let id = npc.id.clone();
        self.inner.publish_npc(&state, &npc);
        state.owned_npcs.insert(id.clone(), npc.clone());

        let event = GameEvent::new(GameEventType::NpcSpawned, self.inner.context.participant_id().clone())
            .with_target(id.clone())
            .with_payload(json!({
                "x": npc.transform.x,
                "y": npc.transform.y,
                "z": npc.transform.z,
            }));
        self.inner.queue_event(&mut state, event)?;

        info!("ReplicationEngine: spawned NPC `{}`", id);
        Ok(id)
    }

    /// Host only. Moves an NPC to its terminal state and emits one
    /// `NpcDied` event.
    pub fn kill_npc(&self, id: &str, killer_id: &str) -> Result<(), ReplicationError> {
        let mut state = self.inner.lock();
        self.inner.require_host(&mut state, "kill_npc")?;
        self.inner.kill_locked(&mut state, id, killer_id, None)
    }

    /// Host only. Applies damage and returns the remaining health. Lethal
    /// damage takes the kill path, so only `NpcDied` is emitted for it.
    pub fn damage_npc(&self, id: &str, amount: f32, source_id: &str) -> Result<f32, ReplicationError> {
        let mut state = self.inner.lock();
        self.inner.require_host(&mut state, "damage_npc")?;

        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        let current = state
            .owned_npcs
            .get(id)
            .ok_or_else(|| ReplicationError::UnknownEntity { id: id.to_string() })?;
        if current.is_terminal() {
            return Err(ReplicationError::AlreadyDead { id: id.to_string() });
        }

        let remaining = (current.health - amount).max(0.0);
        if remaining <= 0.0 {
            self.inner.kill_locked(&mut state, id, source_id, Some(amount))?;
            return Ok(0.0);
        }

        let now = self.inner.server_time(&state);
        let local_id = self.inner.context.participant_id().clone();
        if let Some(npc) = state.owned_npcs.get_mut(id) {
            npc.health = remaining;
            npc.transform.timestamp = now;
            npc.authored_by = Some(local_id.clone());
            if let Some(details) = npc.npc_details_mut() {
                details.last_damaged_by = Some(source_id.to_string());
            }
        }

        if let Some(sync) = &state.sync {
            let mut partial = Map::new();
            partial.insert("health".to_string(), json!(remaining));
            partial.insert("authoredBy".to_string(), json!(local_id));
            partial.insert("transform/timestamp".to_string(), json!(now));
            partial.insert("details/lastDamagedBy".to_string(), json!(source_id));
            self.inner.context.store().update_value(
                &sync.paths.sync_npc(&id.to_string()),
                partial,
                Some(report_write("npc damage")),
            );
        }

        let event = GameEvent::new(GameEventType::DamageDealt, local_id)
            .with_target(id)
            .with_payload(json!({
                "attackerId": source_id,
                "damage": amount,
                "remainingHealth": remaining,
            }));
        self.inner.queue_event(&mut state, event)?;
        Ok(remaining)
    }

    // Events

    /// Publishes an event to every participant. It is also dispatched
    /// locally on the next `update`. Returns the store key of the event.
    pub fn send_event(&self, event: GameEvent) -> Result<String, ReplicationError> {
        let mut state = self.inner.lock();
        self.inner.queue_event(&mut state, event)
    }

    pub fn on_game_event(&self, handler: impl Fn(&GameEvent) + Send + Sync + 'static) {
        self.inner.on_game_event.register(handler);
    }

    pub fn on_player_state_changed(&self, handler: impl Fn(&EntityState) + Send + Sync + 'static) {
        self.inner.on_player_state_changed.register(handler);
    }

    pub fn on_npc_state_changed(&self, handler: impl Fn(&EntityState) + Send + Sync + 'static) {
        self.inner.on_npc_state_changed.register(handler);
    }

    // Time & stats

    pub fn server_time_estimate(&self) -> Millis {
        let state = self.inner.lock();
        self.inner.server_time(&state)
    }

    /// Feeds one clock-sync round trip into the server time estimate.
    pub fn record_clock_sample(&self, sent_at: Millis, server_time: Millis, received_at: Millis) {
        self.inner
            .lock()
            .clock_sync
            .record_round_trip(sent_at, server_time, received_at);
    }

    pub fn stats(&self) -> SyncStats {
        self.inner.lock().stats.clone()
    }
}

impl ReplicationInner {
    fn lock(&self) -> MutexGuard<'_, ReplicationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn server_time(&self, state: &ReplicationState) -> Millis {
        state.clock_sync.estimate(self.context.now())
    }

    fn listen(self: &Arc<Self>, path: &str, ingest: IngestFn) -> ListenerId {
        let weak = Arc::downgrade(self);
        let guard = self.liveness.guard();
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

    fn require_host(
        &self,
        state: &mut ReplicationState,
        operation: &'static str,
    ) -> Result<(), ReplicationError> {
        if state.sync.is_none() {
            warn!("ReplicationEngine: `{}` rejected, not syncing", operation);
            return Err(ReplicationError::NotJoined);
        }
        if !self.authority.is_host() {
            warn!(
                "ReplicationEngine: `{}` rejected, `{}` is not the host",
                operation,
                self.context.participant_id()
            );
            return Err(ReplicationError::NotHost { operation });
        }
        self.sync_role(state);
        Ok(())
    }

    /// Moves NPC state between the owned registry and the interpolation
    /// histories when host authority changes hands.
    fn sync_role(&self, state: &mut ReplicationState) {
        let is_host = state.sync.is_some() && self.authority.is_host();
        if is_host == state.acting_host {
            return;
        }
        state.acting_host = is_host;

        if is_host {
            let adopted: Vec<EntityState> = state
                .npcs
                .drain()
                .filter_map(|(_, history)| history.latest().cloned())
                .collect();
            info!("ReplicationEngine: took authority over {} NPCs", adopted.len());
            for npc in adopted {
                state.owned_npcs.insert(npc.id.clone(), npc);
            }
        } else {
            let capacity = self.config.max_interpolation_states;
            let released = std::mem::take(&mut state.owned_npcs);
            info!("ReplicationEngine: released authority over {} NPCs", released.len());
            for (id, npc) in released {
                let mut history = InterpolationHistory::new(capacity);
                history.push(npc);
                state.npcs.insert(id, history);
            }
        }
    }

    fn stamp(&self, state: &ReplicationState, entity: &mut EntityState) {
        entity.transform.timestamp = self.server_time(state);
        entity.authored_by = Some(self.context.participant_id().clone());
    }

    fn publish_local_player(&self, state: &mut ReplicationState) {
        if !state.local_player_dirty {
            return;
        }
        let (Some(sync), Some(player)) = (&state.sync, &state.local_player) else {
            return;
        };
        match player.to_value() {
            Ok(value) => self.context.store().set_value(
                &sync.paths.sync_player(self.context.participant_id()),
                value,
                Some(report_write("player publish")),
            ),
            Err(error) => warn!("ReplicationEngine: cannot encode local player: {}", error),
        }
        state.local_player_dirty = false;
    }

    fn publish_owned_npcs(&self, state: &mut ReplicationState, now: Millis) {
        let local_id = self.context.participant_id().clone();
        let ReplicationState {
            sync, owned_npcs, ..
        } = state;
        let Some(sync) = sync else {
            return;
        };
        for npc in owned_npcs.values_mut().filter(|npc| !npc.is_terminal()) {
            npc.transform.timestamp = now;
            npc.authored_by = Some(local_id.clone());
            match npc.to_value() {
                Ok(value) => self.context.store().set_value(
                    &sync.paths.sync_npc(&npc.id),
                    value,
                    Some(report_write("npc publish")),
                ),
                Err(error) => warn!("ReplicationEngine: cannot encode NPC `{}`: {}", npc.id, error),
            }
        }
    }

    fn publish_npc(&self, state: &ReplicationState, npc: &EntityState) {
        let Some(sync) = &state.sync else {
            return;
        };
        match npc.to_value() {
            Ok(value) => self.context.store().set_value(
                &sync.paths.sync_npc(&npc.id),
                value,
                Some(report_write("npc publish")),
            ),
            Err(error) => warn!("ReplicationEngine: cannot encode NPC `{}`: {}", npc.id, error),
        }
    }

    fn kill_locked(
        &self,
        state: &mut ReplicationState,
        id: &str,
        killer_id: &str,
        damage: Option<f32>,
    ) -> Result<(), ReplicationError> {
        let now = self.server_time(state);
        let local_id = self.context.participant_id().clone();

        let npc = state
            .owned_npcs
            .get_mut(id)
            .ok_or_else(|| ReplicationError::UnknownEntity { id: id.to_string() })?;
        if npc.is_terminal() {
            return Err(ReplicationError::AlreadyDead { id: id.to_string() });
        }
        npc.mark_dead();
        npc.transform.timestamp = now;
        npc.authored_by = Some(local_id.clone());
        if let Some(details) = npc.npc_details_mut() {
            details.last_damaged_by = Some(killer_id.to_string());
        }
        let npc = npc.clone();
        self.announce_death(state, &npc, killer_id, damage)
    }

    /// Publishes a freshly terminal NPC and queues its `NpcDied` event.
    fn announce_death(
        &self,
        state: &mut ReplicationState,
        npc: &EntityState,
        killer_id: &str,
        damage: Option<f32>,
    ) -> Result<(), ReplicationError> {
        let id = npc.id.as_str();
        let local_id = self.context.participant_id().clone();
        self.publish_npc(state, npc);

        let mut payload = json!({ "killerId": killer_id });
        if let (Some(damage), Some(fields)) = (damage, payload.as_object_mut()) {
            fields.insert("damage".to_string(), json!(damage));
        }
        let event = GameEvent::new(GameEventType::NpcDied, local_id)
            .with_target(id)
            .with_payload(payload);
        self.queue_event(state, event)?;

        info!("ReplicationEngine: NPC `{}` killed by `{}`", id, killer_id);
        Ok(())
    }

    fn queue_event(
        &self,
        state: &mut ReplicationState,
        mut event: GameEvent,
    ) -> Result<String, ReplicationError> {
        let Some(sync) = &state.sync else {
            return Err(ReplicationError::NotJoined);
        };
        if event.source_id.is_empty() {
            event.source_id = self.context.participant_id().clone();
        }
        if event.timestamp == 0 {
            event.timestamp = self.server_time(state);
        }

        let value = event.to_value()?;
        let key = self.context.store().push_value(&sync.paths.sync_events(), value);
        state.seen_events.insert(key.clone());
        state.own_events.push_back((key.clone(), event.timestamp));
        state.pending_events.push_back(event);
        Ok(key)
    }

    /// Deletes this participant's events once they are older than the
    /// retention window. Late joiners skip events from before their start,
    /// so expired ones are never needed again.
    fn expire_own_events(&self, state: &mut ReplicationState, now: Millis) {
        let retention = duration_millis(self.config.event_retention);
        let ReplicationState {
            sync, own_events, ..
        } = state;
        let Some(sync) = sync else {
            return;
        };
        while let Some((key, timestamp)) = own_events.front() {
            if now - *timestamp < retention {
                break;
            }
            self.context.store().delete_value(
                &format!("{}/{}", sync.paths.sync_events(), key),
                Some(report_write("event expiry")),
            );
            own_events.pop_front();
        }
    }

    // Ingest

    fn ingest_players(&self, value: Option<&Value>) {
        let local_id = self.context.participant_id();
        let mut notices = Vec::new();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.sync.is_none() {
                return;
            }
            let capacity = self.config.max_interpolation_states;
            let remote = value.and_then(Value::as_object);

            for (key, child) in remote.into_iter().flatten() {
                if key == local_id {
                    continue;
                }
                let Some(mut sample) = parse_sample(key, child) else {
                    continue;
                };
                if sample.authored_by.as_deref() == Some(local_id.as_str()) {
                    debug!("ReplicationEngine: skipping echo of player `{}`", key);
                    continue;
                }
                sample.id = key.clone();
                let history = state
                    .players
                    .entry(key.clone())
                    .or_insert_with(|| InterpolationHistory::new(capacity));
                if history.push(sample.clone()) {
                    state.counters.player_updates += 1;
                    notices.push(Notice::PlayerChanged(sample));
                }
            }

            state
                .players
                .retain(|id, _| remote.map_or(false, |remote| remote.contains_key(id)));
        }
        self.dispatch(notices);
    }

    fn ingest_npcs(&self, value: Option<&Value>) {
        let local_id = self.context.participant_id();
        let mut notices = Vec::new();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.sync.is_none() {
                return;
            }
            self.sync_role(state);
            let capacity = self.config.max_interpolation_states;
            let remote = value.and_then(Value::as_object);
            let host_id = self.authority.host_id();
            let context = ResolveContext::with_host(host_id.as_deref());

            for (key, child) in remote.into_iter().flatten() {
                let Some(mut sample) = parse_sample(key, child) else {
                    continue;
                };
                if !sample.is_npc() {
                    warn!("ReplicationEngine: `{}` under sync/npcs is not an NPC", key);
                    continue;
                }
                if sample.authored_by.as_deref() == Some(local_id.as_str()) {
                    continue;
                }
                sample.id = key.clone();

                if state.acting_host {
                    let Some(current) = state.owned_npcs.get(key) else {
                        debug!("ReplicationEngine: ignoring unknown NPC `{}` from a peer", key);
                        continue;
                    };
                    let resolved = resolve_entity_state(
                        current,
                        &sample,
                        self.config.npc_conflict_strategy,
                        &context,
                    );
                    if &resolved != current {
                        state.owned_npcs.insert(key.clone(), resolved.clone());
                        state.counters.npc_updates += 1;
                        notices.push(Notice::NpcChanged(resolved));
                    }
                } else {
                    let history = state
                        .npcs
                        .entry(key.clone())
                        .or_insert_with(|| InterpolationHistory::new(capacity));
                    if history.push(sample.clone()) {
                        state.counters.npc_updates += 1;
                        notices.push(Notice::NpcChanged(sample));
                    }
                }
            }

            if !state.acting_host {
                state
                    .npcs
                    .retain(|id, _| remote.map_or(false, |remote| remote.contains_key(id)));
            }
        }
        self.dispatch(notices);
    }

    fn ingest_events(&self, value: Option<&Value>) {
        let local_id = self.context.participant_id();
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(started_at) = state.sync.as_ref().map(|sync| sync.started_at) else {
            return;
        };

        let remote = value.and_then(Value::as_object);
        // Keys that left the store will not be delivered again.
        state
            .seen_events
            .retain(|key| remote.map_or(false, |remote| remote.contains_key(key)));

        for (key, child) in remote.into_iter().flatten() {
            if !state.seen_events.insert(key.clone()) {
                continue;
            }
            let event = match GameEvent::from_value(child) {
                Ok(event) => event,
                Err(error) => {
                    warn!("ReplicationEngine: skipping malformed event `{}`: {}", key, error);
                    continue;
                }
            };
            if &event.source_id == local_id || event.timestamp < started_at {
                continue;
            }
            state.counters.events += 1;
            state.pending_events.push_back(event);
        }
    }

    fn dispatch(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::PlayerChanged(player) => self.on_player_state_changed.emit(&player),
                Notice::NpcChanged(npc) => self.on_npc_state_changed.emit(&npc),
            }
        }
    }
}

fn parse_sample(key: &str, value: &Value) -> Option<EntityState> {
    match EntityState::from_value(value) {
        Ok(sample) => Some(sample),
        Err(error) => {
            warn!("ReplicationEngine: skipping malformed sample `{}`: {}", key, error);
            None
        }
    }
}

fn generate_npc_id(taken: &BTreeMap<EntityId, EntityState>) -> EntityId {
    loop {
        let id = format!("npc_{:016x}", fastrand::u64(..));
        if !taken.contains_key(&id) {
            return id;
        }
    }
}
