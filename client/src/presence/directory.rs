use std::cmp::Ordering;

use log::{debug, info, warn};
use serde_json::{json, Value};

use townsync_shared::{
    store::{SessionPaths, SESSIONS_ROOT},
    wire::{PresenceRecord, SessionDescriptor, WireRecord},
    GeoPoint, LocationProvider,
};

use crate::{error::PresenceError, session::SessionContext};

use super::config::DiscoveryConfig;

/// A known session together with how full and how far away it is
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub descriptor: SessionDescriptor,
    pub player_count: u32,
    pub distance_km: Option<f64>,
}

/// Finds, ranks and creates sessions.
#[derive(Clone)]
pub struct SessionDirectory {
    context: SessionContext,
    config: DiscoveryConfig,
}

impl SessionDirectory {
    pub fn new(context: SessionContext, config: DiscoveryConfig) -> Self {
        Self { context, config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Sessions near `center` that still have room, best candidate first.
    pub fn find_sessions<F>(&self, center: GeoPoint, on_result: F)
    where
        F: FnOnce(Result<Vec<SessionSummary>, PresenceError>) + Send + 'static,
    {
        let config = self.config.clone();
        self.context.store().get_value(
            SESSIONS_ROOT,
            Box::new(move |result| {
                let outcome = result
                    .map(|sessions| {
                        let known = summarize_sessions(sessions.as_ref());
                        rank_sessions(known, &center, &config)
                    })
                    .map_err(PresenceError::from);
                on_result(outcome);
            }),
        );
    }

    /// Registers a new session under a store-generated id.
    pub fn create_session<F>(&self, name: &str, location: Option<GeoPoint>, on_done: F)
    where
        F: FnOnce(Result<SessionDescriptor, PresenceError>) + Send + 'static,
    {
        let store = self.context.store();
        let session_id = store.push_value(SESSIONS_ROOT, json!({ "metadata": { "name": name } }));

        let mut descriptor = SessionDescriptor::new(session_id)
            .with_capacity(self.config.default_capacity);
        descriptor.name = name.to_string();
        descriptor.location = location;
        descriptor.created_at = self.context.now();

        let value = match descriptor.to_value() {
            Ok(value) => value,
            Err(error) => {
                store.delete_value(SessionPaths::new(&descriptor.session_id).root(), None);
                on_done(Err(error.into()));
                return;
            }
        };

        let metadata_path = SessionPaths::new(&descriptor.session_id).metadata();
        store.set_value(
            &metadata_path,
            value,
            Some(Box::new(move |result| {
                match result {
                    Ok(()) => {
                        info!("SessionDirectory: created session `{}`", descriptor.session_id);
                        on_done(Ok(descriptor));
                    }
                    Err(error) => {
                        warn!("SessionDirectory: cannot create session: {}", error);
                        on_done(Err(error.into()));
                    }
                }
            })),
        );
    }

    /// Best existing session near `center`, or a new one there.
    pub fn get_or_create<F>(&self, center: GeoPoint, name: &str, on_done: F)
    where
        F: FnOnce(Result<SessionDescriptor, PresenceError>) + Send + 'static,
    {
        let directory = self.clone();
        let name = name.to_string();
        self.find_sessions(center, move |found| match found {
            Ok(ranked) => match ranked.into_iter().next() {
                Some(best) => {
                    debug!(
                        "SessionDirectory: joining existing session `{}`",
                        best.descriptor.session_id
                    );
                    on_done(Ok(best.descriptor));
                }
                None => directory.create_session(&name, Some(center), on_done),
            },
            Err(error) => on_done(Err(error)),
        });
    }

    /// `get_or_create` around the device location.
    pub fn get_or_create_from_provider<F>(
        &self,
        provider: &dyn LocationProvider,
        name: &str,
        on_done: F,
    ) where
        F: FnOnce(Result<SessionDescriptor, PresenceError>) + Send + 'static,
    {
        if !provider.is_available() {
            on_done(Err(PresenceError::LocationUnavailable));
            return;
        }
        let directory = self.clone();
        let name = name.to_string();
        provider.request_location(Box::new(move |location| match location {
            Some(center) => directory.get_or_create(center, &name, on_done),
            None => on_done(Err(PresenceError::LocationUnavailable)),
        }));
    }
}

/// Reads every `sessions/{id}` node into a summary. Sessions without valid
/// metadata are skipped.
pub fn summarize_sessions(sessions: Option<&Value>) -> Vec<SessionSummary> {
    let Some(Value::Object(sessions)) = sessions else {
        return Vec::new();
    };

    let mut summaries = Vec::new();
    for (session_id, node) in sessions {
        let Some(metadata) = node.get("metadata") else {
            continue;
        };
        let descriptor = match SessionDescriptor::from_value(metadata) {
            Ok(descriptor) if &descriptor.session_id == session_id => descriptor,
            Ok(_) | Err(_) => {
                debug!("SessionDirectory: skipping session `{}` with bad metadata", session_id);
                continue;
            }
        };
        let player_count = node
            .get("players")
            .and_then(Value::as_object)
            .map(|players| {
                players
                    .values()
                    .filter_map(|player| PresenceRecord::from_value(player).ok())
                    .filter(|player| !player.is_offline())
                    .count()
            })
            .unwrap_or(0);

        summaries.push(SessionSummary {
            descriptor,
            player_count: u32::try_from(player_count).unwrap_or(u32::MAX),
            distance_km: None,
        });
    }
    summaries
}

/// Keeps sessions within the radius whose player count lies in
/// `[min_players, max_players)` and that still have room, ordered by player
/// count (fullest first), then distance, then id.
pub fn rank_sessions(
    sessions: Vec<SessionSummary>,
    center: &GeoPoint,
    config: &DiscoveryConfig,
) -> Vec<SessionSummary> {
    let mut ranked: Vec<SessionSummary> = sessions
        .into_iter()
        .filter_map(|mut summary| {
            let location = summary.descriptor.location?;
            let distance = center.distance_km(&location);
            summary.distance_km = Some(distance);
            let in_range = distance <= config.radius_km;
            let in_band = summary.player_count >= config.min_players
                && summary.player_count < config.max_players;
            let has_room = summary.player_count < summary.descriptor.capacity;
            (in_range && in_band && has_room).then_some(summary)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.player_count
            .cmp(&a.player_count)
            .then_with(|| {
                let a_distance = a.distance_km.unwrap_or(f64::MAX);
                let b_distance = b.distance_km.unwrap_or(f64::MAX);
                a_distance.partial_cmp(&b_distance).unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.descriptor.session_id.cmp(&b.descriptor.session_id))
    });
    ranked
}
