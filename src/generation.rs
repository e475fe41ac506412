//! Generational storage: `current`, `previous` and the barrier, rotated on a fixed cadence.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::barrier::Barrier;
use crate::key::CacheKey;

pub(crate) type Value = Arc<dyn Any + Send + Sync>;
pub(crate) type Store = DashMap<CacheKey, Value>;

/// A snapshot of the maps. Cloning only bumps reference counts.
#[derive(Clone)]
pub(crate) struct Generation {
    pub(crate) current: Arc<Store>,
    pub(crate) previous: Arc<Store>,
    pub(crate) barrier: Arc<Barrier>,
    /// Barrier of the demoted generation. Fetches claimed there still publish into `previous`.
    pub(crate) previous_barrier: Arc<Barrier>,
}

impl Generation {
    pub(crate) fn new() -> Self {
        Self {
            current: Arc::new(Store::new()),
            previous: Arc::new(Store::new()),
            barrier: Arc::new(Barrier::new()),
            previous_barrier: Arc::new(Barrier::new()),
        }
    }

    /// Looks the key up in `current`, then in `previous`.
    ///
    /// A hit in `previous` is not promoted, so it still leaves at the next rotation.
    pub(crate) fn lookup<T>(&self, key: &CacheKey) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        if let Some(value) = self.current.get(key).map(|entry| entry.value().clone()) {
            trace!(key = %key, "hit in current generation");
            return value.downcast::<T>().ok();
        }
        if let Some(value) = self.previous.get(key).map(|entry| entry.value().clone()) {
            trace!(key = %key, "hit in previous generation");
            return value.downcast::<T>().ok();
        }
        None
    }

    pub(crate) fn publish<T>(&self, key: CacheKey, value: Arc<T>)
    where
        T: Send + Sync + 'static,
    {
        self.current.insert(key, value);
    }

    pub(crate) fn len(&self) -> usize {
        self.current.len() + self.previous.len()
    }

    /// Demotes `current` to `previous` and starts empty `current` and barrier maps.
    ///
    /// With `skipped` set, more than one boundary passed unobserved and the old `current` is
    /// already two generations old, so it is dropped instead of demoted.
    fn rotate(&mut self, skipped: bool) {
        let demoted = std::mem::replace(&mut self.current, Arc::new(Store::new()));
        let demoted_barrier = std::mem::replace(&mut self.barrier, Arc::new(Barrier::new()));
        if skipped {
            self.previous = Arc::new(Store::new());
            self.previous_barrier = Arc::new(Barrier::new());
        } else {
            self.previous = demoted;
            self.previous_barrier = demoted_barrier;
        }
    }
}

/// Everything guarded by the cache's lock: the map references and the next rotation boundary.
pub(crate) struct State {
    pub(crate) generation: Generation,
    interval: Duration,
    deadline: Instant,
}

impl State {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            generation: Generation::new(),
            interval,
            deadline: Instant::now() + interval,
        }
    }

    pub(crate) fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Rotates if a boundary has passed. Boundaries stay on the `start + n * interval` grid.
    pub(crate) fn rotate_if_due(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        let late = now - self.deadline;
        let skipped = late >= self.interval;
        self.generation.rotate(skipped);

        let into_interval = late.as_nanos() % self.interval.as_nanos();
        // `into_interval` is below `interval`, which fits a u64 of nanoseconds.
        self.deadline = now + (self.interval - Duration::from_nanos(into_interval as u64));
        debug!(skipped, interval = ?self.interval, "rotated cache generation");
        true
    }

    pub(crate) fn clear(&mut self) {
        self.generation = Generation::new();
    }
}
