use std::time::Duration;

use townsync_client::{ConnectionStatus, Participant, ParticipantConfig, ParticipantError, WorldError};
use townsync_shared::{
    store::{RemoteStore, SessionPaths},
    wire::{MapEditEvent, SessionDescriptor, Tile, TileType, WireRecord, WorldEntity},
};
use townsync_test::{assert_tile_agrees, Recorder, TestSession};

fn town() -> SessionDescriptor {
    SessionDescriptor::new("abc123").with_capacity(8).with_seed(7)
}

fn small_world() -> ParticipantConfig {
    let mut config = ParticipantConfig::default();
    config.world.width = 48;
    config.world.height = 48;
    config
}

fn joined(session: &TestSession, id: &str) -> Participant {
    let participant = session.participant_with(id, small_world());
    session.enter(&participant, &town()).unwrap();
    participant
}

/// A tile that differs from whatever `participant` has at `(x, y)`
fn different_tile(participant: &Participant, x: i32, y: i32) -> Tile {
    if participant.world().get_tile(x, y).tile_type == TileType::Building {
        Tile::new(TileType::Tree)
    } else {
        Tile::new(TileType::Building).with_variant(2)
    }
}

#[test]
fn connect_walks_through_states() {
    let session = TestSession::new();
    let a = session.participant_with("A", small_world());
    let statuses = Recorder::new();
    a.world().on_status_changed(statuses.handler());

    session.enter(&a, &town()).unwrap();

    assert_eq!(
        statuses.take(),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Syncing,
            ConnectionStatus::Connected
        ]
    );
    assert!(a.world().is_connected());
}

#[test]
fn generated_grid_is_persisted_and_shared() {
    let session = TestSession::new();
    let a = joined(&session, "A");

    let stored = session
        .store()
        .snapshot(&SessionPaths::new("abc123").map())
        .expect("generated grid should be persisted");
    assert_eq!(stored["width"], 48);

    let b = joined(&session, "B");
    assert_eq!(a.world().map().tiles(), b.world().map().tiles());
    assert_eq!(b.world().dirty_count(), 0);
}

#[test]
fn grid_load_failure_generates_without_persisting() {
    let session = TestSession::new();
    let map_path = SessionPaths::new("abc123").map();
    session.store().fail_reads_under(&map_path);

    let a = joined(&session, "A");

    assert_eq!(a.world().status(), ConnectionStatus::Connected);
    assert_eq!(a.world().map().width(), 48);
    assert!(session.store().snapshot(&map_path).is_none());
}

#[test]
fn entity_load_failure_moves_to_error() {
    let session = TestSession::new();
    session
        .store()
        .fail_reads_under(&SessionPaths::new("abc123").entities());
    let a = session.participant_with("A", small_world());

    let outcome = session.enter(&a, &town());

    assert!(matches!(outcome, Err(ParticipantError::WorldUnavailable { .. })));
    assert_eq!(a.world().status(), ConnectionStatus::Error);
    assert!(!a.presence().is_joined());

    session.store().clear_failures();
    session.enter(&a, &town()).unwrap();
    assert_eq!(a.world().status(), ConnectionStatus::Connected);
}

#[test]
fn tile_edit_reaches_peer() {
    let session = TestSession::new();
    let a = joined(&session, "A");
    let b = joined(&session, "B");
    let at_a = Recorder::new();
    let at_b = Recorder::new();
    a.world().on_map_changed(at_a.handler());
    b.world().on_map_changed(at_b.handler());

    let old_tile = a.world().get_tile(20, 21);
    let tile = different_tile(&a, 20, 21);
    a.world().save_tile_change(20, 21, tile).unwrap();
    session.pump();

    assert_eq!(b.world().get_tile(20, 21), tile);
    assert_tile_agrees!(a, b, 20, 21);

    let changes = at_b.take();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].old_tile, old_tile);
    assert_eq!(changes[0].new_tile, tile);
    assert_eq!(changes[0].changed_by, "A");

    // The local change is reported once, the echo is filtered.
    assert_eq!(at_a.len(), 1);
}

#[test]
fn later_edit_wins() {
    let session = TestSession::new();
    let a = joined(&session, "A");
    let b = joined(&session, "B");

    a.world()
        .save_tile_change(12, 30, Tile::new(TileType::Water))
        .unwrap();
    session.clock().advance(Duration::from_millis(10));
    b.world()
        .save_tile_change(12, 30, Tile::new(TileType::Tree))
        .unwrap();
    session.pump();

    assert_eq!(a.world().get_tile(12, 30).tile_type, TileType::Tree);
    assert_tile_agrees!(a, b, 12, 30);
}

#[test]
fn stale_remote_edit_is_ignored() {
    let session = TestSession::new();
    let a = joined(&session, "A");
    session.clock().advance(Duration::from_secs(1));
    a.world()
        .save_tile_change(9, 40, Tile::new(TileType::Road))
        .unwrap();
    session.pump();

    let stale = MapEditEvent {
        x: 9,
        y: 40,
        tile: Tile::new(TileType::Water),
        edited_by: "Z".to_string(),
        timestamp: session.now() - 500,
    };
    session.store().set_value(
        &SessionPaths::new("abc123").map_change(9, 40),
        stale.to_value().unwrap(),
        None,
    );
    session.pump();

    assert_eq!(a.world().get_tile(9, 40).tile_type, TileType::Road);
}

#[test]
fn out_of_range_tiles() {
    let session = TestSession::new();
    let a = joined(&session, "A");

    assert_eq!(a.world().get_tile(-1, 0), Tile::EMPTY);
    assert_eq!(a.world().get_tile(0, 48), Tile::EMPTY);
    assert!(!a.world().set_tile(48, 0, Tile::default()));
    assert_eq!(a.world().dirty_count(), 0);
    assert!(matches!(
        a.world().save_tile_change(-3, 2, Tile::default()),
        Err(WorldError::OutOfBounds { x: -3, y: 2, .. })
    ));
}

#[test]
fn flushed_grid_is_seen_by_later_joiner() {
    let session = TestSession::new();
    let a = joined(&session, "A");
    let tile = different_tile(&a, 25, 26);

    assert!(a.world().set_tile(25, 26, tile));
    assert_eq!(a.world().dirty_count(), 1);
    a.world().save_changes().unwrap();
    session.pump();
    assert_eq!(a.world().dirty_count(), 0);

    let c = joined(&session, "C");
    assert_eq!(c.world().get_tile(25, 26), tile);
}

#[test]
fn full_flush_replaces_earlier_tile_edits() {
    let session = TestSession::new();
    let a = joined(&session, "A");
    let paths = SessionPaths::new("abc123");

    a.world()
        .save_tile_change(25, 26, Tile::new(TileType::Water))
        .unwrap();
    session.pump();
    assert!(session.store().snapshot(&paths.map_change(25, 26)).is_some());

    assert!(a.world().set_tile(25, 26, Tile::new(TileType::Road)));
    a.world().save_changes().unwrap();
    session.pump();
    assert!(session.store().snapshot(&paths.map_changes()).is_none());

    let c = joined(&session, "C");
    assert_eq!(a.world().get_tile(25, 26).tile_type, TileType::Road);
    assert_tile_agrees!(a, c, 25, 26);
}

#[test]
fn disconnect_before_grid_read_cancels_connect() {
    let session = TestSession::new();
    let a = session.participant_with("A", small_world());
    let outcome = Recorder::new();
    let sink = outcome.clone();

    a.world()
        .connect_to_session(town(), move |connected| sink.push(connected));
    a.world().disconnect_from_session();
    session.pump();

    assert_eq!(outcome.take(), vec![false]);
    assert_eq!(a.world().status(), ConnectionStatus::Disconnected);
    assert_eq!(a.world().map().width(), 0);
    assert!(session
        .store()
        .snapshot(&SessionPaths::new("abc123").map())
        .is_none());
}

#[test]
fn autosave_flushes_dirty_tiles() {
    let session = TestSession::new();
    let a = joined(&session, "A");
    let tile = different_tile(&a, 30, 30);
    a.world().set_tile(30, 30, tile);

    session.run_for(&[&a], Duration::from_secs(31), Duration::from_secs(1));

    assert_eq!(a.world().dirty_count(), 0);
    let c = joined(&session, "C");
    assert_eq!(c.world().get_tile(30, 30), tile);
}

#[test]
fn entity_directory_syncs() {
    let session = TestSession::new();
    let a = joined(&session, "A");
    let b = joined(&session, "B");
    let spawned_at_a = Recorder::new();
    let spawned_at_b = Recorder::new();
    let removed_at_b = Recorder::new();
    a.world().on_entity_spawned(spawned_at_a.handler());
    b.world().on_entity_spawned(spawned_at_b.handler());
    b.world().on_entity_removed(removed_at_b.str_handler());

    let id = a
        .world()
        .spawn_entity(WorldEntity::new("", "crate").at(1.0, 0.0, 1.0))
        .unwrap();
    assert!(id.starts_with("entity_"));
    session.pump();

    assert_eq!(spawned_at_a.len(), 1);
    let spawned = spawned_at_b.take();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].id, id);
    assert_eq!(b.world().get_entity(&id).unwrap().entity_type, "crate");

    let mut moved = a.world().get_entity(&id).unwrap();
    moved.x = 4.0;
    a.world().update_entity(moved).unwrap();
    session.pump();
    assert_eq!(b.world().get_entity(&id).unwrap().x, 4.0);
    assert!(spawned_at_b.is_empty());

    a.world().remove_entity(&id).unwrap();
    session.pump();
    assert_eq!(removed_at_b.take(), vec![id.clone()]);
    assert!(b.world().get_entities().is_empty());

    assert!(matches!(
        a.world().remove_entity(&id),
        Err(WorldError::UnknownEntity { .. })
    ));
    assert!(matches!(
        a.world().update_entity(WorldEntity::new("ghost", "crate")),
        Err(WorldError::UnknownEntity { .. })
    ));
}

#[test]
fn disconnect_clears_world() {
    let session = TestSession::new();
    let a = joined(&session, "A");
    a.world()
        .spawn_entity(WorldEntity::new("barrel_1", "barrel"))
        .unwrap();

    a.world().disconnect_from_session();

    assert_eq!(a.world().status(), ConnectionStatus::Disconnected);
    assert!(a.world().get_entities().is_empty());
    assert_eq!(a.world().get_tile(0, 0), Tile::EMPTY);
    assert!(matches!(a.world().save_changes(), Err(WorldError::NotConnected)));
}
