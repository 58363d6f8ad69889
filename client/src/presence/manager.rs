use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, info, warn};
use serde_json::Value;

use townsync_shared::{
    store::{ListenerId, SessionPaths},
    wire::{NetworkTransform, PresenceRecord, PresenceStatus, SessionDescriptor, WireRecord},
    CallbackList, HostRole, ParticipantId, SessionId, SessionLiveness, Timer,
};

use crate::{
    authority::AuthorityMutator, duration_millis, error::PresenceError, report_write,
    session::SessionContext,
};

use super::{
    config::PresenceConfig,
    roster::{Roster, RosterDiff, RosterSnapshot},
};

/// Presence & session manager for one participant.
///
/// Owns the roster of the joined session, keeps the local record fresh with
/// a heartbeat, and detects silent participants with a purely local timeout
/// sweep. Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct PresenceManager {
    inner: Arc<PresenceInner>,
}

struct PresenceInner {
    context: SessionContext,
    config: PresenceConfig,
    authority: AuthorityMutator,
    liveness: SessionLiveness,
    state: Mutex<PresenceState>,
    on_joined: CallbackList<PresenceRecord>,
    on_left: CallbackList<str>,
    on_updated: CallbackList<PresenceRecord>,
    on_host_changed: CallbackList<Option<ParticipantId>>,
}

struct JoinedSession {
    descriptor: SessionDescriptor,
    paths: SessionPaths,
    roster_listener: ListenerId,
}

struct PresenceState {
    session: Option<JoinedSession>,
    local: PresenceRecord,
    roster: Roster,
    host_id: Option<ParticipantId>,
    heartbeat: Timer,
    sweep: Timer,
}

enum Notice {
    Joined(PresenceRecord),
    Left(ParticipantId),
    Updated(PresenceRecord),
    HostChanged(Option<ParticipantId>),
}

impl PresenceManager {
    pub fn new(context: SessionContext, config: PresenceConfig, authority: AuthorityMutator) -> Self {
        let local = PresenceRecord::new(
            context.participant_id().clone(),
            context.identity().display_name.clone(),
        );
        let state = PresenceState {
            session: None,
            local,
            roster: Roster::new(),
            host_id: None,
            heartbeat: Timer::new(config.heartbeat_interval),
            sweep: Timer::new(config.sweep_interval),
        };

        Self {
            inner: Arc::new(PresenceInner {
                context,
                config,
                authority,
                liveness: SessionLiveness::new(),
                state: Mutex::new(state),
                on_joined: CallbackList::new(),
                on_left: CallbackList::new(),
                on_updated: CallbackList::new(),
                on_host_changed: CallbackList::new(),
            }),
        }
    }

    // Session lifecycle

    /// Joins the session described by `descriptor`, leaving any current
    /// session first. `on_done` receives the outcome once the current
    /// participant count has been read from the store.
    pub fn join_session<F>(&self, descriptor: SessionDescriptor, on_done: F)
    where
        F: FnOnce(Result<(), PresenceError>) + Send + 'static,
    {
        if let Err(error) = descriptor.validate() {
            warn!("PresenceManager: refusing to join: {}", error);
            on_done(Err(PresenceError::InvalidDescriptor {
                session_id: descriptor.session_id.clone(),
                reason: error.to_string(),
            }));
            return;
        }

        self.leave_session();

        let guard = self.inner.liveness.begin();
        let paths = SessionPaths::new(&descriptor.session_id);
        let players_path = paths.players();
        let weak = Arc::downgrade(&self.inner);

        self.inner.context.store().get_value(
            &players_path,
            Box::new(move |result| {
                let Some(inner) = weak.upgrade() else {
                    on_done(Err(PresenceError::Superseded));
                    return;
                };
                if !guard.is_live() {
                    debug!(
                        "PresenceManager: join of `{}` superseded",
                        descriptor.session_id
                    );
                    on_done(Err(PresenceError::Superseded));
                    return;
                }
                let outcome = match result {
                    Ok(players) => inner.finish_join(descriptor, paths, players.as_ref()),
                    Err(error) => {
                        warn!(
                            "PresenceManager: cannot read roster of `{}`: {}",
                            descriptor.session_id, error
                        );
                        Err(PresenceError::Store(error))
                    }
                };
                on_done(outcome);
            }),
        );
    }

    /// Stops listening, deletes the local record and forgets the roster. A
    /// join still waiting on the store reports `Superseded`.
    pub fn leave_session(&self) {
        self.inner.liveness.end();
        let left = {
            let mut state = self.inner.lock();
            let Some(session) = state.session.take() else {
                return;
            };
            let store = self.inner.context.store();
            store.stop_listening_by_id(session.roster_listener);
            store.delete_value(
                &session.paths.player(self.inner.context.participant_id()),
                Some(report_write("presence delete")),
            );
            state.roster.clear();
            state.local.is_host = false;
            state.host_id = None;
            session.descriptor.session_id
        };

        self.inner.authority.clear();
        info!("PresenceManager: left session `{}`", left);
    }

    /// Drives the heartbeat and the timeout sweep.
    pub fn update(&self, delta: Duration) {
        let mut notices = Vec::new();
        {
            let mut state = self.inner.lock();
            if state.session.is_none() {
                return;
            }
            let now = self.inner.context.now();

            state.heartbeat.tick(delta);
            state.sweep.tick(delta);

            if state.heartbeat.ringing() {
                state.heartbeat.reset();
                state.local.last_seen = now;
                self.inner.write_local(&state);
            }

            if state.sweep.ringing() {
                state.sweep.reset();
                let timeout = duration_millis(self.inner.config.offline_timeout);
                for id in state.roster.sweep(now, timeout) {
                    info!("PresenceManager: `{}` timed out", id);
                    notices.push(Notice::Left(id));
                }
                self.inner.refresh_host(&mut state, &mut notices);
            }
        }
        self.inner.dispatch(notices);
    }

    // Local presence

    /// Buffers the local transform. It is written with the next heartbeat.
    pub fn update_position(&self, x: f32, y: f32, z: f32, rotation: f32) {
        let now = self.inner.context.now();
        let mut state = self.inner.lock();
        state.local.transform = NetworkTransform::at_position(x, y, z)
            .with_rotation(0.0, rotation, 0.0)
            .with_timestamp(now);
    }

    /// Replaces the local display name, transform and status and writes the
    /// record immediately. Identity and host flag are kept.
    pub fn update_local_presence(&self, record: PresenceRecord) {
        let now = self.inner.context.now();
        let mut state = self.inner.lock();
        state.local.display_name = record.display_name;
        state.local.transform = record.transform;
        state.local.status = record.status;
        state.local.last_seen = now;
        self.inner.write_local(&state);
    }

    pub fn set_status(&self, status: PresenceStatus) {
        let mut record = self.local_record();
        record.status = status;
        self.update_local_presence(record);
    }

    // Queries

    /// Local record plus every known participant, ordered by id. Empty when
    /// not joined.
    pub fn get_roster(&self) -> Vec<PresenceRecord> {
        let state = self.inner.lock();
        if state.session.is_none() {
            return Vec::new();
        }
        let mut roster: Vec<PresenceRecord> = state.roster.records().cloned().collect();
        roster.push(state.local.clone());
        roster.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        roster
    }

    pub fn get_player(&self, participant_id: &str) -> Option<PresenceRecord> {
        let state = self.inner.lock();
        state.session.as_ref()?;
        if participant_id == state.local.participant_id {
            return Some(state.local.clone());
        }
        state.roster.get(participant_id).cloned()
    }

    pub fn local_record(&self) -> PresenceRecord {
        self.inner.lock().local.clone()
    }

    pub fn is_joined(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    pub fn is_host(&self) -> bool {
        let state = self.inner.lock();
        state.session.is_some() && state.local.is_host
    }

    pub fn host_id(&self) -> Option<ParticipantId> {
        self.inner.lock().host_id.clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|session| session.descriptor.session_id.clone())
    }

    pub fn descriptor(&self) -> Option<SessionDescriptor> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|session| session.descriptor.clone())
    }

    // Callbacks

    pub fn on_joined(&self, handler: impl Fn(&PresenceRecord) + Send + Sync + 'static) {
        self.inner.on_joined.register(handler);
    }

    pub fn on_left(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.inner.on_left.register(handler);
    }

    pub fn on_updated(&self, handler: impl Fn(&PresenceRecord) + Send + Sync + 'static) {
        self.inner.on_updated.register(handler);
    }

    pub fn on_host_changed(&self, handler: impl Fn(&Option<ParticipantId>) + Send + Sync + 'static) {
        self.inner.on_host_changed.register(handler);
    }
}

impl PresenceInner {
    fn lock(&self) -> MutexGuard<'_, PresenceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_join(
        self: &Arc<Self>,
        descriptor: SessionDescriptor,
        paths: SessionPaths,
        players: Option<&Value>,
    ) -> Result<(), PresenceError> {
        let now = self.context.now();
        let local_id = self.context.participant_id().clone();
        let timeout = duration_millis(self.config.offline_timeout);

        let snapshot = RosterSnapshot::from_value(players, &local_id);
        let present = snapshot
            .records()
            .filter(|record| record.is_live(now, timeout))
            .count();
        let present = u32::try_from(present).unwrap_or(u32::MAX);
        if present >= descriptor.capacity {
            warn!(
                "PresenceManager: session `{}` is full ({}/{})",
                descriptor.session_id, present, descriptor.capacity
            );
            return Err(PresenceError::CapacityFull {
                session_id: descriptor.session_id,
                capacity: descriptor.capacity,
                present,
            });
        }

        let is_host = present == 0;
        let session_id = descriptor.session_id.clone();
        let roster_listener = self.listen_roster(&paths);

        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            state.local.last_seen = now;
            state.local.is_host = is_host;
            if state.local.status == PresenceStatus::Offline {
                state.local.status = PresenceStatus::Online;
            }
            state.session = Some(JoinedSession {
                descriptor,
                paths,
                roster_listener,
            });
            state.heartbeat.reset();
            state.sweep.reset();
            state.roster.clear();

            self.authority
                .set_session(session_id.clone(), HostRole::from_is_host(is_host));
            self.write_local(&state);

            let diff = state.roster.apply(snapshot);
            push_diff(&mut notices, diff);
            self.refresh_host(&mut state, &mut notices);
        }

        info!(
            "PresenceManager: `{}` joined session `{}` as {}",
            local_id,
            session_id,
            if is_host { "host" } else { "guest" }
        );
        self.dispatch(notices);
        Ok(())
    }

    fn listen_roster(self: &Arc<Self>, paths: &SessionPaths) -> ListenerId {
        let weak = Arc::downgrade(self);
        let guard = self.liveness.guard();
        self.context.store().listen_to_path(
            &paths.players(),
            Box::new(move |value| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if guard.is_live() {
                    inner.ingest_roster(value.as_ref());
                }
            }),
        )
    }

    fn ingest_roster(&self, value: Option<&Value>) {
        let snapshot = RosterSnapshot::from_value(value, self.context.participant_id());
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            if state.session.is_none() {
                return;
            }
            let diff = state.roster.apply(snapshot);
            push_diff(&mut notices, diff);
            self.refresh_host(&mut state, &mut notices);
        }
        self.dispatch(notices);
    }

    fn write_local(&self, state: &PresenceState) {
        let Some(session) = &state.session else {
            return;
        };
        match state.local.to_value() {
            Ok(value) => self.context.store().set_value(
                &session.paths.player(&state.local.participant_id),
                value,
                Some(report_write("presence write")),
            ),
            Err(error) => warn!("PresenceManager: cannot encode local record: {}", error),
        }
    }

    /// Re-derives the host after the roster changed, applying the election
    /// policy when no present participant holds host.
    fn refresh_host(&self, state: &mut PresenceState, notices: &mut Vec<Notice>) {
        let local_id = state.local.participant_id.clone();

        if state.local.is_host {
            let lower_claim = state
                .roster
                .host_id()
                .map_or(false, |other| *other < local_id);
            if lower_claim {
                info!("PresenceManager: `{}` steps down as host", local_id);
                state.local.is_host = false;
                self.authority.set_role(HostRole::Guest);
                self.write_local(state);
            }
        }

        let mut host = if state.local.is_host {
            Some(local_id.clone())
        } else {
            state.roster.host_id().cloned()
        };

        if host.is_none() {
            let local_present = state.local.status != PresenceStatus::Offline;
            let candidates = state
                .roster
                .present_ids()
                .chain(local_present.then_some(local_id.as_str()));
            let elected = self
                .config
                .host_election
                .elect(candidates)
                .map(str::to_string);
            if elected.as_deref() == Some(local_id.as_str()) {
                info!("PresenceManager: `{}` elected host", local_id);
                state.local.is_host = true;
                self.authority.set_role(HostRole::Host);
                self.write_local(state);
                host = Some(local_id);
            }
        }

        if host != state.host_id {
            state.host_id = host.clone();
            self.authority.set_host_id(host.clone());
            notices.push(Notice::HostChanged(host));
        }
    }

    fn dispatch(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::Joined(record) => self.on_joined.emit(&record),
                Notice::Left(id) => self.on_left.emit(id.as_str()),
                Notice::Updated(record) => self.on_updated.emit(&record),
                Notice::HostChanged(host) => self.on_host_changed.emit(&host),
            }
        }
    }
}

fn push_diff(notices: &mut Vec<Notice>, diff: RosterDiff) {
    notices.extend(diff.joined.into_iter().map(Notice::Joined));
    notices.extend(diff.left.into_iter().map(Notice::Left));
    notices.extend(diff.updated.into_iter().map(Notice::Updated));
}
