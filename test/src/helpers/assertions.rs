/// Assert that a roster lists exactly the given participant ids, in order
#[macro_export]
macro_rules! assert_roster_ids {
    ($participant:expr, [$($id:expr),* $(,)?]) => {
        let ids: Vec<String> = $participant
            .presence()
            .get_roster()
            .into_iter()
            .map(|record| record.participant_id)
            .collect();
        let expected: Vec<String> = vec![$($id.to_string()),*];
        assert_eq!(ids, expected, "roster mismatch");
    };
}

/// Assert that two participants see the same tile at a coordinate
#[macro_export]
macro_rules! assert_tile_agrees {
    ($a:expr, $b:expr, $x:expr, $y:expr) => {
        assert_eq!(
            $a.world().get_tile($x, $y),
            $b.world().get_tile($x, $y),
            "participants disagree on tile ({}, {})",
            $x,
            $y
        );
    };
}
