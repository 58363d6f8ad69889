use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Generation counter tied to the lifetime of one joined session.
///
/// Every asynchronous store callback captures a [`LivenessGuard`]; once the
/// session is torn down (or a new one begins) the generation moves on and the
/// guard reports the callback as stale.
#[derive(Clone, Debug, Default)]
pub struct SessionLiveness {
    generation: Arc<AtomicU64>,
}

impl SessionLiveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new session lifetime, invalidating every outstanding guard.
    pub fn begin(&self) -> LivenessGuard {
        let expected = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        LivenessGuard {
            generation: self.generation.clone(),
            expected,
        }
    }

    /// Ends the current session lifetime.
    pub fn end(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Guard for the current lifetime.
    pub fn guard(&self) -> LivenessGuard {
        LivenessGuard {
            generation: self.generation.clone(),
            expected: self.generation.load(Ordering::SeqCst),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LivenessGuard {
    generation: Arc<AtomicU64>,
    expected: u64,
}

impl LivenessGuard {
    pub fn is_live(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.expected
    }
}
