use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::barrier::{self, Claim, Flight};
use crate::config::{CacheConfig, Invalidation};
use crate::error::{Error, Result};
use crate::generation::{Generation, State};
use crate::key::CacheKey;

/// A value the cache knows how to fetch.
///
/// The destination passed to [`Cache::remember`] is also the value source: on a miss the cache
/// calls `fetch` on it and copies the result into it with [`Clone::clone_from`]. Callers always
/// get their own copy, never the cached instance.
pub trait Fetch: Clone + Send + Sync + 'static {
    /// The caller's key. Its `Display` form is part of the cache key.
    type Key: fmt::Display + Sync + ?Sized;
    /// The error reported by the value source.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the current value for `key` from the underlying source.
    fn fetch(&self, key: &Self::Key) -> impl Future<Output = Result<Self, Self::Error>> + Send;
}

/// Where a lookup ended up: a cached value, or the obligation to fetch one.
enum Lookup<T> {
    Hit(Arc<T>),
    Fetch(Generation, Flight),
}

/// A generational memoization cache.
///
/// Values are kept in a `current` generation which is demoted to `previous` once per rotation
/// interval, so nothing is served longer than two intervals after it was fetched. Concurrent
/// misses on the same key share one fetch.
pub struct Cache {
    state: RwLock<State>,
    config: CacheConfig,
}

impl Cache {
    /// Creates a new cache rotating every `rotation_interval`.
    pub fn new(rotation_interval: Duration) -> Self {
        Self::with_config(CacheConfig::default().with_rotation_interval(rotation_interval))
    }

    /// Creates a new cache from a full configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            state: RwLock::new(State::new(config.effective_interval())),
            config,
        }
    }

    /// Gets the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Gets the rotation interval in effect, after clamping.
    pub fn rotation_interval(&self) -> Duration {
        self.config.effective_interval()
    }

    /// Fills `dst` with the value for `key`, fetching it through `dst` on a miss.
    ///
    /// Lookup order is the current generation, the previous one, then the barrier. If another
    /// caller is already fetching the key this waits for its result instead of fetching again.
    /// A failed fetch is recorded and returned to every caller until the next rotation.
    ///
    /// Dropping this future while it owns the fetch cancels the fetch; a waiting caller then
    /// takes over.
    pub async fn remember<T: Fetch>(&self, dst: &mut T, key: &T::Key) -> Result<()> {
        let cache_key = CacheKey::new::<T, _>(key);
        let value = match self.lookup::<T>(&cache_key).await? {
            Lookup::Hit(value) => value,
            Lookup::Fetch(generation, flight) => {
                fetch_and_settle(generation, flight, cache_key, &*dst, key).await?
            }
        };
        dst.clone_from(&value);
        Ok(())
    }

    /// Like [`Cache::remember`], giving up after `timeout`.
    ///
    /// The fetch is never cancelled by the timeout: when this caller owns it, it runs on a
    /// spawned task and still populates the cache for later callers.
    pub async fn remember_timeout<T>(
        &self,
        dst: &mut T,
        key: &T::Key,
        timeout: Duration,
    ) -> Result<()>
    where
        T: Fetch,
        T::Key: ToOwned,
        <T::Key as ToOwned>::Owned: Send + Sync + 'static,
    {
        let cache_key = CacheKey::new::<T, _>(key);
        let timed_out = || Error::Timeout {
            key: cache_key.to_string(),
            timeout,
        };

        let fetch = async {
            let value = match self.lookup::<T>(&cache_key).await? {
                Lookup::Hit(value) => value,
                Lookup::Fetch(generation, flight) => {
                    let source = dst.clone();
                    let owned_key = key.to_owned();
                    let cache_key = cache_key.clone();
                    let task = tokio::spawn(async move {
                        fetch_and_settle(generation, flight, cache_key, &source, owned_key.borrow())
                            .await
                    });
                    match task.await {
                        Ok(res) => res?,
                        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                        Err(_) => return Err(timed_out()),
                    }
                }
            };
            Ok::<_, Error>(value)
        };

        let res = tokio::time::timeout(timeout, fetch).await;
        match res {
            Ok(value) => {
                dst.clone_from(&*value?);
                Ok(())
            }
            Err(_) => Err(timed_out()),
        }
    }

    /// Invalidates the value of type `T` stored under `key`.
    ///
    /// What happens next depends on [`Invalidation`]: with `Tombstone` the key fails with
    /// [`Error::Deleted`] until the next rotation, with `Refetch` the next call fetches again.
    /// A fetch that was in flight for the key still returns its value to its own caller but
    /// does not store it.
    pub fn delete<T: Fetch>(&self, key: &T::Key) {
        let cache_key = CacheKey::new::<T, _>(key);
        let mut state = self.state.write();
        state.rotate_if_due(Instant::now());

        let generation = &state.generation;
        // The barrier goes first: an in-flight fetch publishes only while it still owns its slot.
        match self.config.invalidation {
            Invalidation::Tombstone => {
                generation
                    .barrier
                    .insert(cache_key.clone(), barrier::Slot::Failed(Error::deleted(&cache_key)));
            }
            Invalidation::Refetch => {
                generation.barrier.remove(&cache_key);
            }
        }
        // A fetch claimed before the last rotation would publish into `previous`.
        generation.previous_barrier.remove(&cache_key);
        generation.current.remove(&cache_key);
        generation.previous.remove(&cache_key);
        debug!(key = %cache_key, invalidation = ?self.config.invalidation, "deleted");
    }

    /// Clears all items from the cache
    pub fn delete_all(&self) {
        let mut state = self.state.write();
        state.clear();
        debug!("cleared all generations");
    }

    /// Gets the number of values held by the current and previous generations
    pub fn size(&self) -> usize {
        self.generation().len()
    }

    /// Resolves `key` to a cached value or to ownership of its fetch, waiting on other fetchers.
    async fn lookup<T: Fetch>(&self, cache_key: &CacheKey) -> Result<Lookup<T>> {
        loop {
            let generation = self.generation();
            if let Some(value) = generation.lookup::<T>(cache_key) {
                return Ok(Lookup::Hit(value));
            }

            match barrier::claim(&generation.barrier, cache_key) {
                Claim::Failed(err) => return Err(err),
                Claim::Wait(done) => {
                    trace!(key = %cache_key, "waiting for in-flight fetch");
                    barrier::wait(done).await;
                }
                Claim::Owner(flight) => {
                    // A fetch may have settled between the lookup and the claim.
                    if let Some(value) = generation.lookup::<T>(cache_key) {
                        flight.release();
                        return Ok(Lookup::Hit(value));
                    }
                    return Ok(Lookup::Fetch(generation, flight));
                }
            }
        }
    }

    /// Snapshot of the maps, rotating first if a boundary has passed.
    fn generation(&self) -> Generation {
        let now = Instant::now();
        {
            let state = self.state.read();
            if !state.is_due(now) {
                return state.generation.clone();
            }
        }
        let mut state = self.state.write();
        state.rotate_if_due(now);
        state.generation.clone()
    }
}

/// Runs the owned fetch, publishes a success into `generation` and settles the flight.
async fn fetch_and_settle<T: Fetch>(
    generation: Generation,
    flight: Flight,
    cache_key: CacheKey,
    source: &T,
    key: &T::Key,
) -> Result<Arc<T>> {
    debug!(key = %cache_key, "fetching value");
    match source.fetch(key).await {
        Ok(value) => {
            let value = Arc::new(value);
            let published =
                flight.succeed(|| generation.publish(cache_key.clone(), value.clone()));
            if !published {
                debug!(key = %cache_key, "key invalidated during fetch, value not stored");
            }
            Ok(value)
        }
        Err(source) => {
            let err = Error::fetch(&cache_key, source);
            debug!(key = %cache_key, error = %err, "fetch failed");
            flight.fail(err.clone());
            Err(err)
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("size", &self.size())
            .finish()
    }
}
