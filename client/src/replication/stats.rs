use std::time::Duration;

use townsync_shared::Millis;

/// Replication throughput over the last full second of ticks
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncStats {
    pub player_updates_per_second: f32,
    pub npc_updates_per_second: f32,
    pub events_per_second: f32,
    pub tracked_players: usize,
    pub tracked_npcs: usize,
    pub estimated_latency_ms: Option<Millis>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct StatsCounters {
    pub player_updates: u32,
    pub npc_updates: u32,
    pub events: u32,
}

impl StatsCounters {
    /// Turns the counts of the elapsed window into rates and starts a new
    /// window.
    pub fn roll(&mut self, window: Duration, stats: &mut SyncStats) {
        let seconds = window.as_secs_f32();
        let rate = |count: u32| if seconds > 0.0 { count as f32 / seconds } else { 0.0 };
        stats.player_updates_per_second = rate(self.player_updates);
        stats.npc_updates_per_second = rate(self.npc_updates);
        stats.events_per_second = rate(self.events);
        *self = Self::default();
    }
}
