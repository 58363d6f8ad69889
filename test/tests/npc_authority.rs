use std::time::Duration;

use serde_json::json;

use townsync_client::{Participant, ReplicationError};
use townsync_shared::{
    store::{RemoteStore, SessionPaths},
    wire::{
        BehaviorState, EntityState, GameEvent, GameEventType, NetworkTransform, SessionDescriptor,
        WireRecord,
    },
};
use townsync_test::{Recorder, TestSession};

const STEP: Duration = Duration::from_millis(50);

fn town() -> SessionDescriptor {
    SessionDescriptor::new("abc123").with_capacity(8)
}

fn host_and_guest(session: &TestSession) -> (Participant, Participant) {
    let a = session.participant("A");
    let b = session.participant("B");
    session.enter(&a, &town()).unwrap();
    session.enter(&b, &town()).unwrap();
    (a, b)
}

fn zombie() -> EntityState {
    let mut npc = EntityState::npc("", NetworkTransform::at_position(5.0, 0.0, 5.0));
    npc.set_behavior(BehaviorState::Roaming);
    npc
}

fn events_of(events: &[GameEvent], event_type: GameEventType) -> Vec<GameEvent> {
    events
        .iter()
        .filter(|event| event.event_type == event_type)
        .cloned()
        .collect()
}

#[test]
fn host_spawn_reaches_guest() {
    let session = TestSession::new();
    let (a, b) = host_and_guest(&session);

    let id = a.replication().spawn_npc(zombie()).unwrap();
    assert!(id.starts_with("npc_"));
    session.pump();

    let seen = b.replication().get_npc_state(&id).expect("guest should see the NPC");
    assert_eq!(seen.transform.x, 5.0);
    assert_eq!(seen.behavior(), Some(BehaviorState::Roaming));
    assert_eq!(seen.authored_by.as_deref(), Some("A"));
    assert_eq!(a.replication().get_all_npc_states().len(), 1);
}

#[test]
fn guest_cannot_author_npcs() {
    let session = TestSession::new();
    let (a, b) = host_and_guest(&session);
    let id = a.replication().spawn_npc(zombie()).unwrap();
    session.pump();

    assert!(matches!(
        b.replication().spawn_npc(zombie()),
        Err(ReplicationError::NotHost { .. })
    ));
    assert!(matches!(
        b.replication().kill_npc(&id, "B"),
        Err(ReplicationError::NotHost { .. })
    ));
    assert!(matches!(
        b.replication().damage_npc(&id, 10.0, "B"),
        Err(ReplicationError::NotHost { .. })
    ));

    session.run_for(&[&a, &b], Duration::from_millis(500), STEP);
    let state = a.replication().get_npc_state(&id).unwrap();
    assert!(!state.is_terminal());
    assert_eq!(state.health, 100.0);
}

#[test]
fn kill_emits_single_death_event() {
    let session = TestSession::new();
    let (a, b) = host_and_guest(&session);
    let id = a.replication().spawn_npc(zombie()).unwrap();
    session.tick(&[&a, &b], STEP);

    let host_events = Recorder::new();
    let guest_events = Recorder::new();
    a.replication().on_game_event(host_events.handler());
    b.replication().on_game_event(guest_events.handler());

    a.replication().kill_npc(&id, "B").unwrap();
    assert!(matches!(
        a.replication().kill_npc(&id, "B"),
        Err(ReplicationError::AlreadyDead { .. })
    ));
    session.run_for(&[&a, &b], Duration::from_millis(500), STEP);

    for events in [host_events.take(), guest_events.take()] {
        let deaths = events_of(&events, GameEventType::NpcDied);
        assert_eq!(deaths.len(), 1);
        assert_eq!(deaths[0].target_id.as_deref(), Some(id.as_str()));
        assert_eq!(deaths[0].payload["killerId"], json!("B"));
    }

    let seen = b.replication().get_npc_state(&id).unwrap();
    assert!(seen.is_dead);
    assert_eq!(seen.health, 0.0);
    assert_eq!(seen.behavior(), Some(BehaviorState::Dead));
}

#[test]
fn lethal_damage_only_reports_death() {
    let session = TestSession::new();
    let (a, b) = host_and_guest(&session);
    let id = a.replication().spawn_npc(zombie()).unwrap();
    session.tick(&[&a, &b], STEP);

    let guest_events = Recorder::new();
    b.replication().on_game_event(guest_events.handler());

    assert_eq!(a.replication().damage_npc(&id, 250.0, "B").unwrap(), 0.0);
    session.run_for(&[&a, &b], Duration::from_millis(300), STEP);

    let events = guest_events.take();
    assert!(events_of(&events, GameEventType::DamageDealt).is_empty());
    let deaths = events_of(&events, GameEventType::NpcDied);
    assert_eq!(deaths.len(), 1);
    assert_eq!(deaths[0].payload["damage"], json!(250.0));
}

#[test]
fn terminal_state_set_by_host_reaches_guest() {
    let session = TestSession::new();
    let (a, b) = host_and_guest(&session);
    let id = a.replication().spawn_npc(zombie()).unwrap();
    session.tick(&[&a, &b], STEP);

    let guest_events = Recorder::new();
    b.replication().on_game_event(guest_events.handler());

    let mut npc = a.replication().get_npc_state(&id).unwrap();
    npc.mark_dead();
    a.replication().set_npc_state(npc.clone()).unwrap();
    a.replication().set_npc_state(npc).unwrap();
    session.run_for(&[&a, &b], Duration::from_secs(3), STEP);

    let deaths = events_of(&guest_events.take(), GameEventType::NpcDied);
    assert_eq!(deaths.len(), 1);
    assert_eq!(deaths[0].payload["killerId"], json!("A"));

    let hosted = a.replication().get_npc_state(&id).unwrap();
    let seen = b.replication().get_npc_state(&id).unwrap();
    for state in [hosted, seen] {
        assert!(state.is_dead);
        assert_eq!(state.behavior(), Some(BehaviorState::Dead));
    }
}

#[test]
fn damage_updates_guest_view() {
    let session = TestSession::new();
    let (a, b) = host_and_guest(&session);
    let id = a.replication().spawn_npc(zombie()).unwrap();
    session.tick(&[&a, &b], STEP);

    let guest_events = Recorder::new();
    b.replication().on_game_event(guest_events.handler());

    assert_eq!(a.replication().damage_npc(&id, 30.0, "B").unwrap(), 70.0);
    session.run_for(&[&a, &b], Duration::from_millis(500), STEP);

    let damage = events_of(&guest_events.take(), GameEventType::DamageDealt);
    assert_eq!(damage.len(), 1);
    assert_eq!(damage[0].payload["remainingHealth"], json!(70.0));
    assert_eq!(damage[0].payload["attackerId"], json!("B"));

    let seen = b.replication().get_npc_state(&id).unwrap();
    assert_eq!(seen.health, 70.0);
    assert_eq!(
        seen.npc_details().and_then(|details| details.last_damaged_by.as_deref()),
        Some("B")
    );
}

#[test]
fn host_ignores_peer_npc_writes() {
    let session = TestSession::new();
    let (a, _b) = host_and_guest(&session);
    let id = a.replication().spawn_npc(zombie()).unwrap();
    session.tick(&[&a], STEP);

    let mut forged = a.replication().get_npc_state(&id).unwrap();
    forged.health = 1.0;
    forged.authored_by = Some("B".to_string());
    forged.transform.timestamp += 10_000;
    session.store().set_value(
        &SessionPaths::new("abc123").sync_npc(&id),
        forged.to_value().unwrap(),
        None,
    );
    session.pump();

    assert_eq!(a.replication().get_npc_state(&id).unwrap().health, 100.0);

    let mut unknown = EntityState::npc("npc_forged", NetworkTransform::default());
    unknown.authored_by = Some("B".to_string());
    session.store().set_value(
        &SessionPaths::new("abc123").sync_npc(&unknown.id),
        unknown.to_value().unwrap(),
        None,
    );
    session.pump();
    assert!(a.replication().get_npc_state("npc_forged").is_none());
}

#[test]
fn new_host_adopts_npcs() {
    let session = TestSession::new();
    let (a, b) = host_and_guest(&session);
    let id = a.replication().spawn_npc(zombie()).unwrap();
    session.tick(&[&a, &b], STEP);

    a.leave();
    session.tick(&[&b], STEP);

    assert!(b.presence().is_host());
    assert_eq!(b.replication().get_all_npc_states().len(), 1);
    assert_eq!(b.replication().damage_npc(&id, 40.0, "B").unwrap(), 60.0);
}
