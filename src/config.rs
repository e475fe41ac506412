use std::time::Duration;

const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(60);
const MIN_ROTATION_INTERVAL: Duration = Duration::from_millis(1);
// About thirty years; deadlines are computed by adding the interval to the current instant.
const MAX_ROTATION_INTERVAL: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// What `delete` leaves behind for the deleted key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Invalidation {
    /// Record a tombstone: every `remember` for the key fails with [`crate::Error::Deleted`]
    /// until the next rotation, and only then is a fresh fetch made.
    #[default]
    Tombstone,
    /// Forget the key entirely: the next `remember` fetches a fresh value right away.
    ///
    /// A fetch already in flight for the key is forgotten too, so the next `remember` may start
    /// a second fetch while the first is still running. The first one still answers its own
    /// caller but its value is not stored.
    Refetch,
}

/// Configuration for the Cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How often the current generation is demoted. A value lives at most two intervals.
    pub rotation_interval: Duration,
    /// What `delete` leaves behind.
    pub invalidation: Invalidation,
}

impl CacheConfig {
    /// Sets the rotation interval.
    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    /// Sets what `delete` leaves behind.
    pub fn with_invalidation(mut self, invalidation: Invalidation) -> Self {
        self.invalidation = invalidation;
        self
    }

    /// The rotation interval actually used, clamped between 1ms and about thirty years.
    pub(crate) fn effective_interval(&self) -> Duration {
        self.rotation_interval.clamp(MIN_ROTATION_INTERVAL, MAX_ROTATION_INTERVAL)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            invalidation: Invalidation::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.rotation_interval, Duration::from_secs(60));
        assert_eq!(config.invalidation, Invalidation::Tombstone);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = CacheConfig::default().with_rotation_interval(Duration::ZERO);
        assert_eq!(config.effective_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_huge_interval_is_clamped() {
        let config = CacheConfig::default().with_rotation_interval(Duration::MAX);
        assert_eq!(config.effective_interval(), MAX_ROTATION_INTERVAL);
        assert!(tokio::time::Instant::now()
            .checked_add(config.effective_interval())
            .is_some());
    }
}
