use townsync_client::{ParticipantConfig, PresenceError, SessionSummary};
use townsync_shared::{wire::SessionDescriptor, FixedLocation, GeoPoint};
use townsync_test::TestSession;

type Created = Result<SessionDescriptor, PresenceError>;
type Found = Result<Vec<SessionSummary>, PresenceError>;

fn main_street() -> GeoPoint {
    GeoPoint::new(52.5200, 13.4050)
}

fn across_town() -> GeoPoint {
    // Roughly 1.1 km north
    GeoPoint::new(52.5300, 13.4050)
}

fn far_away() -> GeoPoint {
    GeoPoint::new(48.8566, 2.3522)
}

#[test]
fn created_session_is_found_nearby() {
    let session = TestSession::new();
    let a = session.participant("A");

    let created: Created = session
        .wait_for(|done| a.directory().create_session("Main Street", Some(main_street()), done));
    let created = created.unwrap();
    assert!(created.is_valid());
    assert_eq!(created.name, "Main Street");
    assert_eq!(created.capacity, a.directory().config().default_capacity);

    let found: Found = session.wait_for(|done| a.directory().find_sessions(across_town(), done));
    let found = found.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].descriptor.session_id, created.session_id);
    assert!(found[0].distance_km.unwrap() < 2.0);

    let far: Found = session.wait_for(|done| a.directory().find_sessions(far_away(), done));
    assert!(far.unwrap().is_empty());
}

#[test]
fn get_or_create_prefers_existing_session() {
    let session = TestSession::new();
    let a = session.participant("A");
    let b = session.participant("B");

    let first: Created = session
        .wait_for(|done| a.directory().get_or_create(main_street(), "Main Street", done));
    let first = first.unwrap();
    session.enter(&a, &first).unwrap();

    let second: Created = session
        .wait_for(|done| b.directory().get_or_create(across_town(), "Elsewhere", done));
    assert_eq!(second.unwrap().session_id, first.session_id);

    let third: Created =
        session.wait_for(|done| b.directory().get_or_create(far_away(), "Paris", done));
    assert_ne!(third.unwrap().session_id, first.session_id);
}

#[test]
fn busy_sessions_outside_the_band_are_skipped() {
    let session = TestSession::new();
    let a = session.participant("A");
    let b = session.participant("B");
    let mut picky = ParticipantConfig::default();
    picky.discovery.max_players = 2;
    let c = session.participant_with("C", picky);

    let created: Created = session
        .wait_for(|done| a.directory().create_session("Main Street", Some(main_street()), done));
    let created = created.unwrap();
    session.enter(&a, &created).unwrap();

    let found: Found = session.wait_for(|done| c.directory().find_sessions(main_street(), done));
    assert_eq!(found.unwrap()[0].player_count, 1);

    session.enter(&b, &created).unwrap();
    let found: Found = session.wait_for(|done| c.directory().find_sessions(main_street(), done));
    assert!(found.unwrap().is_empty());
}

#[test]
fn provider_without_location_fails() {
    let session = TestSession::new();
    let a = session.participant("A");

    let outcome: Created = session.wait_for(|done| {
        a.directory()
            .get_or_create_from_provider(&FixedLocation::unavailable(), "Nowhere", done)
    });
    assert!(matches!(outcome, Err(PresenceError::LocationUnavailable)));

    let outcome: Created = session.wait_for(|done| {
        a.directory()
            .get_or_create_from_provider(&FixedLocation::new(main_street()), "Main Street", done)
    });
    assert!(outcome.is_ok());
}
