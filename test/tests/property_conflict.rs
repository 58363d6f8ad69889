/// PROPERTY-BASED TESTS: conflict resolution
///
/// Key invariants:
/// 1. LastWins and FirstWins pick the same value whatever the argument order
/// 2. HighestHealthWins never raises health
/// 3. Merge never resurrects

use proptest::prelude::*;
use townsync_shared::{
    pick_winner, resolve_entity_state, resolve_map_edit, ConflictStrategy, ResolveContext, Winner,
    wire::{EntityState, MapEditEvent, NetworkTransform, Tile, TileType},
};

fn author() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["alice", "bob", "carol"]).prop_map(str::to_string)
}

fn tile_type() -> impl Strategy<Value = TileType> {
    prop::sample::select(vec![
        TileType::Ground,
        TileType::Road,
        TileType::Building,
        TileType::Tree,
        TileType::Water,
    ])
}

fn edit_strategy() -> impl Strategy<Value = MapEditEvent> {
    (tile_type(), author(), 0i64..50).prop_map(|(tile_type, edited_by, timestamp)| MapEditEvent {
        x: 3,
        y: 4,
        tile: Tile::new(tile_type),
        edited_by,
        timestamp,
    })
}

fn npc_strategy() -> impl Strategy<Value = EntityState> {
    (0.0f32..100.0, -50.0f32..50.0, 0i64..50, author(), any::<bool>()).prop_map(
        |(health, x, timestamp, author, dead)| {
            let mut npc = EntityState::npc("npc_1", NetworkTransform::at_position(x, 0.0, 0.0))
                .with_timestamp(timestamp);
            npc.health = health;
            npc.authored_by = Some(author);
            if dead {
                npc.mark_dead();
            }
            npc
        },
    )
}

fn chosen<'a, T>(winner: Winner, current: &'a T, incoming: &'a T) -> &'a T {
    match winner {
        Winner::Current => current,
        Winner::Incoming => incoming,
    }
}

proptest! {
    #[test]
    fn prop_order_independent_edits(
        a in edit_strategy(),
        b in edit_strategy(),
        strategy in prop::sample::select(vec![ConflictStrategy::LastWins, ConflictStrategy::FirstWins]),
    ) {
        let ctx = ResolveContext::default();
        let ab = chosen(resolve_map_edit(&a, &b, strategy, &ctx), &a, &b);
        let ba = chosen(resolve_map_edit(&b, &a, strategy, &ctx), &b, &a);
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn prop_order_independent_states(
        a in npc_strategy(),
        b in npc_strategy(),
        strategy in prop::sample::select(vec![ConflictStrategy::LastWins, ConflictStrategy::FirstWins]),
    ) {
        let ctx = ResolveContext::default();
        let ab = chosen(pick_winner(&a, &b, strategy, &ctx), &a, &b);
        let ba = chosen(pick_winner(&b, &a, strategy, &ctx), &b, &a);
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn prop_damage_sticks(a in npc_strategy(), b in npc_strategy()) {
        let ctx = ResolveContext::default();
        let resolved = resolve_entity_state(&a, &b, ConflictStrategy::HighestHealthWins, &ctx);
        prop_assert_eq!(resolved.health, a.health.min(b.health));
    }

    #[test]
    fn prop_merge_never_resurrects(a in npc_strategy(), b in npc_strategy()) {
        let ctx = ResolveContext::default();
        let merged = resolve_entity_state(&a, &b, ConflictStrategy::Merge, &ctx);
        prop_assert!(merged.health <= a.health.min(b.health));
        if a.is_terminal() || b.is_terminal() {
            prop_assert!(merged.is_terminal());
        }
    }

    #[test]
    fn prop_host_write_always_wins(a in npc_strategy(), b in npc_strategy()) {
        prop_assume!(a.authored_by != b.authored_by);
        let host = a.authored_by.clone();
        let ctx = ResolveContext::with_host(host.as_deref());
        prop_assert_eq!(&resolve_entity_state(&a, &b, ConflictStrategy::HostWins, &ctx), &a);
        prop_assert_eq!(&resolve_entity_state(&b, &a, ConflictStrategy::HostWins, &ctx), &a);
    }
}
