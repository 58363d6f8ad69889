use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use townsync_client::{
    LocalIdentity, Participant, ParticipantConfig, ParticipantError, SessionContext,
};
use townsync_shared::{
    store::InMemoryStore,
    wire::SessionDescriptor,
    Clock, ManualClock, Millis,
};

/// Clock value every test session starts at
pub const TEST_EPOCH: Millis = 1_700_000_000_000;

/// Routes `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A shared in-memory store plus one manual clock, standing in for the
/// remote backend every participant of a test talks to.
pub struct TestSession {
    store: Arc<InMemoryStore>,
    clock: ManualClock,
}

impl TestSession {
    pub fn new() -> Self {
        init_logging();
        Self {
            store: Arc::new(InMemoryStore::new()),
            clock: ManualClock::new(TEST_EPOCH),
        }
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn now(&self) -> Millis {
        self.clock.now_millis()
    }

    pub fn context(&self, participant_id: &str) -> SessionContext {
        SessionContext::new(
            LocalIdentity::new(participant_id, participant_id),
            self.store.clone(),
            Arc::new(self.clock.clone()),
        )
    }

    pub fn participant(&self, participant_id: &str) -> Participant {
        self.participant_with(participant_id, ParticipantConfig::default())
    }

    pub fn participant_with(&self, participant_id: &str, config: ParticipantConfig) -> Participant {
        Participant::new(self.context(participant_id), config)
    }

    /// Delivers every pending store callback and notification.
    pub fn pump(&self) -> usize {
        self.store.poll()
    }

    /// Starts an asynchronous call, pumps the store and returns the value
    /// its completion callback received.
    pub fn wait_for<T, F>(&self, start: F) -> T
    where
        T: Send + 'static,
        F: FnOnce(Box<dyn FnOnce(T) + Send>),
    {
        let slot = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        start(Box::new(move |value| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        }));
        self.pump();
        let value = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        value.expect("callback did not fire after pumping the store")
    }

    /// Runs `enter_session` to completion.
    pub fn enter(
        &self,
        participant: &Participant,
        descriptor: &SessionDescriptor,
    ) -> Result<(), ParticipantError> {
        self.wait_for(|done| participant.enter_session(descriptor.clone(), done))
    }

    /// Advances the clock by `delta`, ticks `participants` once and pumps.
    pub fn tick(&self, participants: &[&Participant], delta: Duration) {
        self.clock.advance(delta);
        for participant in participants {
            participant.update(delta);
        }
        self.pump();
    }

    /// Ticks in `step` increments until `total` has elapsed.
    pub fn run_for(&self, participants: &[&Participant], total: Duration, step: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            self.tick(participants, step);
            elapsed += step;
        }
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}
