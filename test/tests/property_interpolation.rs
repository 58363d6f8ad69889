/// PROPERTY-BASED TESTS: interpolation history
///
/// Key invariants:
/// 1. Evaluating at a sample's own timestamp reproduces it exactly
/// 2. The midpoint of two samples is the mean of their positions
/// 3. Arrival order never changes the stored order

use proptest::prelude::*;
use townsync_client::InterpolationHistory;
use townsync_shared::wire::{EntityState, NetworkTransform};

fn coordinate() -> impl Strategy<Value = f32> {
    -1000.0f32..1000.0f32
}

fn transform_strategy() -> impl Strategy<Value = NetworkTransform> {
    (coordinate(), coordinate(), coordinate(), coordinate())
        .prop_map(|(x, y, z, rot)| NetworkTransform::at_position(x, y, z).with_rotation(0.0, rot, 0.0))
}

fn sample(transform: NetworkTransform, timestamp: i64, health: f32) -> EntityState {
    let mut state = EntityState::npc("npc_1", transform.with_timestamp(timestamp));
    state.health = health;
    state
}

proptest! {
    #[test]
    fn prop_endpoints_are_exact(
        a in transform_strategy(),
        b in transform_strategy(),
        t0 in 0i64..1_000_000,
        gap in 1i64..10_000,
    ) {
        let mut history = InterpolationHistory::new(20);
        history.push(sample(a, t0, 100.0));
        history.push(sample(b, t0 + gap, 40.0));

        let first = history.sample_at(t0).unwrap();
        prop_assert_eq!(first.transform, a.with_timestamp(t0));
        prop_assert_eq!(first.health, 100.0);

        let last = history.sample_at(t0 + gap).unwrap();
        prop_assert_eq!(last.transform, b.with_timestamp(t0 + gap));
        prop_assert_eq!(last.health, 40.0);
    }

    #[test]
    fn prop_midpoint_is_mean(
        a in transform_strategy(),
        b in transform_strategy(),
        t0 in 0i64..1_000_000,
        half in 1i64..5_000,
    ) {
        let mut history = InterpolationHistory::new(20);
        history.push(sample(a, t0, 100.0));
        history.push(sample(b, t0 + 2 * half, 40.0));

        let mid = history.sample_at(t0 + half).unwrap();
        let close = |got: f32, want: f32| (got - want).abs() <= 1e-3 * want.abs().max(1.0);
        prop_assert!(close(mid.transform.x, (a.x + b.x) / 2.0));
        prop_assert!(close(mid.transform.y, (a.y + b.y) / 2.0));
        prop_assert!(close(mid.transform.z, (a.z + b.z) / 2.0));
        // Discrete fields come from the later sample.
        prop_assert_eq!(mid.health, 40.0);
    }

    #[test]
    fn prop_history_is_sorted_and_bounded(
        timestamps in prop::collection::vec(0i64..10_000, 1..60),
        capacity in 1usize..25,
    ) {
        let mut history = InterpolationHistory::new(capacity);
        for timestamp in &timestamps {
            history.push(sample(NetworkTransform::default(), *timestamp, 100.0));
        }

        let kept: Vec<i64> = history.timestamps().collect();
        prop_assert!(kept.len() <= capacity);
        prop_assert!(kept.windows(2).all(|pair| pair[0] < pair[1]));

        let mut unique = timestamps.clone();
        unique.sort_unstable();
        unique.dedup();
        let newest = &unique[unique.len().saturating_sub(capacity)..];
        prop_assert_eq!(kept.as_slice(), newest);
    }
}
