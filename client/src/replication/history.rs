use std::collections::VecDeque;

use townsync_shared::{wire::EntityState, Millis};

/// Bounded, timestamp-ordered sample history of one remote entity.
///
/// Samples may arrive in any order; they are kept sorted by timestamp and the
/// oldest is dropped once the capacity is exceeded.
#[derive(Clone, Debug)]
pub struct InterpolationHistory {
    samples: VecDeque<EntityState>,
    capacity: usize,
    interpolated: Option<EntityState>,
}

impl InterpolationHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            interpolated: None,
        }
    }

    /// Records a sample. A sample carrying an already known timestamp
    /// replaces the known one. Returns `false` when nothing changed: the
    /// sample was already known, or it is older than everything a full
    /// history keeps.
    pub fn push(&mut self, sample: EntityState) -> bool {
        let timestamp = sample.timestamp();
        let index = self
            .samples
            .partition_point(|known| known.timestamp() < timestamp);
        if let Some(known) = self.samples.get_mut(index) {
            if known.timestamp() == timestamp {
                if *known == sample {
                    return false;
                }
                *known = sample;
                return true;
            }
        }

        if self.interpolated.is_none() {
            self.interpolated = Some(sample.clone());
        }
        self.samples.insert(index, sample);

        if self.samples.len() > self.capacity {
            self.samples.pop_front();
            if index == 0 {
                return false;
            }
        }
        true
    }

    /// State at `target`: linear blend of the continuous fields of the two
    /// bracketing samples, discrete fields from the later one. Outside the
    /// recorded range the nearest sample is held.
    pub fn sample_at(&self, target: Millis) -> Option<EntityState> {
        if self.samples.len() < 2 {
            return self.samples.back().cloned();
        }

        let next_index = self
            .samples
            .partition_point(|sample| sample.timestamp() < target);
        if next_index == 0 {
            return self.samples.front().cloned();
        }
        let (Some(prev), Some(next)) = (self.samples.get(next_index - 1), self.samples.get(next_index))
        else {
            return self.samples.back().cloned();
        };

        let span = (next.timestamp() - prev.timestamp()) as f64;
        let t = (target - prev.timestamp()) as f64 / span;
        let transform = prev.transform.lerp(&next.transform, t as f32);
        Some(next.with_transform(transform))
    }

    /// Recomputes the cached value for `target`.
    pub fn interpolate(&mut self, target: Millis) {
        if let Some(state) = self.sample_at(target) {
            self.interpolated = Some(state);
        }
    }

    pub fn interpolated(&self) -> Option<&EntityState> {
        self.interpolated.as_ref()
    }

    pub fn latest(&self) -> Option<&EntityState> {
        self.samples.back()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Millis> + '_ {
        self.samples.iter().map(EntityState::timestamp)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
