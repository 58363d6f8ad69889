use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde_json::Value;

use townsync_shared::{
    store::KeyedSnapshot,
    wire::{PresenceRecord, PresenceStatus, WireRecord},
    Millis, ParticipantId,
};

/// Parsed remote roster, without the local participant.
#[derive(Clone, Debug, Default)]
pub struct RosterSnapshot {
    raw: KeyedSnapshot,
    records: BTreeMap<ParticipantId, PresenceRecord>,
}

impl RosterSnapshot {
    /// Malformed entries and the entry keyed by `local_id` are dropped.
    pub fn from_value(value: Option<&Value>, local_id: &str) -> Self {
        let mut snapshot = Self::default();
        let Some(Value::Object(children)) = value else {
            return snapshot;
        };

        for (key, child) in children {
            if key == local_id {
                continue;
            }
            match PresenceRecord::from_value(child) {
                Ok(record) if &record.participant_id == key => {
                    snapshot.raw.insert(key.clone(), child.clone());
                    snapshot.records.insert(key.clone(), record);
                }
                Ok(record) => warn!(
                    "Roster: record under `{}` claims id `{}`, skipping",
                    key, record.participant_id
                ),
                Err(error) => warn!("Roster: skipping malformed record `{}`: {}", key, error),
            }
        }

        snapshot
    }

    pub fn records(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Notifications produced by applying a snapshot or a sweep
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RosterDiff {
    pub joined: Vec<PresenceRecord>,
    pub left: Vec<ParticipantId>,
    pub updated: Vec<PresenceRecord>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty() && self.updated.is_empty()
    }
}

/// The other participants of the joined session, as seen locally.
///
/// Timed-out participants keep a local `Offline` overlay until the remote
/// record shows a newer `lastSeen` (they rejoined) or disappears (they left).
#[derive(Debug, Default)]
pub struct Roster {
    records: BTreeMap<ParticipantId, PresenceRecord>,
    raw: KeyedSnapshot,
    timed_out: HashMap<ParticipantId, Millis>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the known roster with `next`, returning what changed.
    pub fn apply(&mut self, next: RosterSnapshot) -> RosterDiff {
        let RosterSnapshot { raw, mut records } = next;
        let changes = self.raw.diff(&raw, None);
        let mut diff = RosterDiff::default();

        for id in changes.added {
            if let Some(record) = records.remove(&id) {
                self.timed_out.remove(&id);
                self.records.insert(id, record.clone());
                diff.joined.push(record);
            }
        }

        for id in changes.removed {
            self.records.remove(&id);
            if self.timed_out.remove(&id).is_none() {
                diff.left.push(id);
            }
        }

        for id in changes.changed {
            let Some(mut record) = records.remove(&id) else {
                continue;
            };
            match self.timed_out.get(&id).copied() {
                Some(timed_out_at) if record.last_seen > timed_out_at => {
                    self.timed_out.remove(&id);
                    self.records.insert(id, record.clone());
                    diff.joined.push(record);
                }
                Some(_) => {
                    record.status = PresenceStatus::Offline;
                    self.records.insert(id, record);
                }
                None => {
                    self.records.insert(id, record.clone());
                    diff.updated.push(record);
                }
            }
        }

        self.raw = raw;
        diff
    }

    /// Marks online participants whose `lastSeen` is older than
    /// `offline_timeout_ms` as offline. Each participant is reported once.
    pub fn sweep(&mut self, now: Millis, offline_timeout_ms: i64) -> Vec<ParticipantId> {
        let mut timed_out = Vec::new();
        for (id, record) in self.records.iter_mut() {
            if record.status == PresenceStatus::Online && now - record.last_seen > offline_timeout_ms {
                record.status = PresenceStatus::Offline;
                self.timed_out.insert(id.clone(), record.last_seen);
                timed_out.push(id.clone());
            }
        }
        timed_out
    }

    pub fn get(&self, id: &str) -> Option<&PresenceRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.records.values()
    }

    /// Lowest id among present participants claiming host
    pub fn host_id(&self) -> Option<&ParticipantId> {
        self.records
            .values()
            .filter(|record| record.is_host && !record.is_offline())
            .map(|record| &record.participant_id)
            .min()
    }

    pub fn present_ids(&self) -> impl Iterator<Item = &str> {
        self.records
            .values()
            .filter(|record| !record.is_offline())
            .map(|record| record.participant_id.as_str())
    }

    pub fn is_timed_out(&self, id: &str) -> bool {
        self.timed_out.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.raw = KeyedSnapshot::new();
        self.timed_out.clear();
    }
}
