use std::time::Duration;

/// Interval timer driven by the per-frame tick rather than by the OS clock.
///
/// The owner feeds elapsed frame time through [`Timer::tick`] and checks
/// [`Timer::ringing`]; a ringing timer stays ringing until it is reset.
#[derive(Clone, Debug)]
pub struct Timer {
    duration: Duration,
    elapsed: Duration,
}

impl Timer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            elapsed: Duration::ZERO,
        }
    }

    /// Builds a timer that rings `rate_hz` times per second.
    /// Non-positive rates produce a timer that never rings.
    pub fn from_rate(rate_hz: f32) -> Self {
        if rate_hz.is_finite() && rate_hz > 0.0 {
            Self::new(Duration::from_secs_f64(1.0 / f64::from(rate_hz)))
        } else {
            Self::new(Duration::MAX)
        }
    }

    pub fn tick(&mut self, delta: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta);
    }

    pub fn ringing(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }
}
