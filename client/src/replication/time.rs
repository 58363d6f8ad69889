use townsync_shared::Millis;

/// Estimates the shared session time from the local clock.
///
/// The offset starts at zero. A clock-sync exchange may feed round trips
/// through [`ServerTimeEstimator::record_round_trip`].
#[derive(Clone, Debug, Default)]
pub struct ServerTimeEstimator {
    offset: Millis,
    latency: Option<Millis>,
}

impl ServerTimeEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate(&self, local_now: Millis) -> Millis {
        local_now + self.offset
    }

    /// `sent_at` and `received_at` are local times around a request that the
    /// server answered with `server_time`.
    pub fn record_round_trip(&mut self, sent_at: Millis, server_time: Millis, received_at: Millis) {
        let round_trip = received_at - sent_at;
        if round_trip < 0 {
            return;
        }
        let one_way = round_trip / 2;
        self.latency = Some(one_way);
        self.offset = server_time + one_way - received_at;
    }

    pub fn offset(&self) -> Millis {
        self.offset
    }

    pub fn latency(&self) -> Option<Millis> {
        self.latency
    }
}
