/// PROPERTY-BASED TESTS: roster reconciliation
///
/// Key invariants:
/// 1. Re-applying an unchanged snapshot reports nothing
/// 2. A snapshot diff reports each participant under exactly one heading
/// 3. A sweep reports each silent participant once

use proptest::prelude::*;
use serde_json::{Map, Value};
use townsync_client::{Roster, RosterSnapshot};
use townsync_shared::wire::{PresenceRecord, WireRecord};

const LOCAL: &str = "local";

fn roster_value(entries: &[(String, i64)]) -> Value {
    let mut players = Map::new();
    for (id, last_seen) in entries {
        let mut record = PresenceRecord::new(id.clone(), id.clone());
        record.last_seen = *last_seen;
        players.insert(id.clone(), record.to_value().unwrap());
    }
    Value::Object(players)
}

fn entries_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::btree_map("[a-f]{1,3}", 0i64..100_000, 0..12)
        .prop_map(|entries| entries.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_unchanged_snapshot_is_quiet(entries in entries_strategy()) {
        let value = roster_value(&entries);
        let mut roster = Roster::new();
        let first = roster.apply(RosterSnapshot::from_value(Some(&value), LOCAL));
        prop_assert_eq!(first.joined.len(), entries.len());

        let again = roster.apply(RosterSnapshot::from_value(Some(&value), LOCAL));
        prop_assert!(again.joined.is_empty());
        prop_assert!(again.left.is_empty());
        prop_assert!(again.updated.is_empty());
    }

    #[test]
    fn prop_diff_partitions_participants(
        before in entries_strategy(),
        after in entries_strategy(),
    ) {
        let mut roster = Roster::new();
        roster.apply(RosterSnapshot::from_value(Some(&roster_value(&before)), LOCAL));
        let diff = roster.apply(RosterSnapshot::from_value(Some(&roster_value(&after)), LOCAL));

        let before_ids: Vec<&String> = before.iter().map(|(id, _)| id).collect();
        let after_ids: Vec<&String> = after.iter().map(|(id, _)| id).collect();
        for record in &diff.joined {
            prop_assert!(!before_ids.contains(&&record.participant_id));
        }
        for id in &diff.left {
            prop_assert!(!after_ids.contains(&id));
        }
        for record in &diff.updated {
            prop_assert!(before_ids.contains(&&record.participant_id));
        }
        prop_assert_eq!(roster.len(), after.len());
    }

    #[test]
    fn prop_sweep_reports_once(entries in entries_strategy(), now in 100_000i64..200_000) {
        let mut roster = Roster::new();
        roster.apply(RosterSnapshot::from_value(Some(&roster_value(&entries)), LOCAL));

        let timeout = 15_000;
        let expected = entries
            .iter()
            .filter(|(_, last_seen)| now - last_seen > timeout)
            .count();
        prop_assert_eq!(roster.sweep(now, timeout).len(), expected);
        prop_assert!(roster.sweep(now + 60_000, timeout).len() == entries.len() - expected);
        prop_assert!(roster.sweep(now + 120_000, timeout).is_empty());
    }
}

#[test]
fn local_entry_is_never_part_of_the_roster() {
    let value = roster_value(&[(LOCAL.to_string(), 5), ("peer".to_string(), 5)]);
    let snapshot = RosterSnapshot::from_value(Some(&value), LOCAL);
    assert_eq!(snapshot.len(), 1);
}
