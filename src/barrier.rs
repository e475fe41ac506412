//! Single-flight barrier: at most one fetch per key per generation.
//!
//! A key's slot is either an open completion signal (someone is fetching) or the error the last
//! fetch ended with. The signal is a `watch` channel that never sends; dropping the sender
//! closes it and wakes every waiter at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tracing::debug;

use crate::error::Error;
use crate::key::CacheKey;

static NEXT_FLIGHT: AtomicU64 = AtomicU64::new(0);

pub(crate) enum Slot {
    InFlight { id: u64, done: watch::Receiver<()> },
    Failed(Error),
}

pub(crate) type Barrier = DashMap<CacheKey, Slot>;

/// Outcome of trying to become the fetcher for a key.
pub(crate) enum Claim {
    /// This caller must fetch and settle the flight.
    Owner(Flight),
    /// Another caller is fetching; wait for the signal to close.
    Wait(watch::Receiver<()>),
    /// The last fetch failed or the key was deleted.
    Failed(Error),
}

pub(crate) fn claim(barrier: &Arc<Barrier>, key: &CacheKey) -> Claim {
    match barrier.entry(key.clone()) {
        Entry::Occupied(entry) => match entry.get() {
            Slot::InFlight { done, .. } => Claim::Wait(done.clone()),
            Slot::Failed(err) => Claim::Failed(err.clone()),
        },
        Entry::Vacant(entry) => {
            let id = NEXT_FLIGHT.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = watch::channel(());
            entry.insert(Slot::InFlight { id, done: rx });
            Claim::Owner(Flight {
                barrier: barrier.clone(),
                key: key.clone(),
                id,
                done: Some(tx),
                settled: false,
            })
        }
    }
}

/// Waits until the flight behind `done` is settled or abandoned.
pub(crate) async fn wait(mut done: watch::Receiver<()>) {
    // Nothing is ever sent, so this only returns once the sender is gone.
    while done.changed().await.is_ok() {}
}

/// Ownership of an in-flight fetch.
///
/// Dropping an unsettled flight (the owner's future was cancelled) removes its slot so that a
/// waiter can take over the fetch.
pub(crate) struct Flight {
    barrier: Arc<Barrier>,
    key: CacheKey,
    id: u64,
    done: Option<watch::Sender<()>>,
    settled: bool,
}

impl Flight {
    /// Runs `publish` and clears the slot, unless the slot was replaced or removed meanwhile
    /// (the key was deleted). Returns whether `publish` ran.
    ///
    /// The slot's shard stays locked while publishing, so a concurrent `delete` either sees
    /// the published value or prevents the publish.
    pub(crate) fn succeed(mut self, publish: impl FnOnce()) -> bool {
        let published = match self.barrier.entry(self.key.clone()) {
            Entry::Occupied(entry) if self.owns(entry.get()) => {
                publish();
                entry.remove();
                true
            }
            _ => false,
        };
        self.settled = true;
        self.done.take();
        published
    }

    /// Settles without publishing anything; the value was already stored by someone else.
    pub(crate) fn release(mut self) {
        self.remove_own_slot();
        self.settled = true;
        self.done.take();
    }

    /// Records `err` for every later caller of this generation, then wakes waiters.
    ///
    /// A slot that no longer belongs to this flight (deleted meanwhile) is left alone.
    pub(crate) fn fail(mut self, err: Error) {
        if let Some(mut slot) = self.barrier.get_mut(&self.key) {
            if self.owns(&slot) {
                *slot = Slot::Failed(err);
            }
        }
        self.settled = true;
        self.done.take();
    }

    fn owns(&self, slot: &Slot) -> bool {
        matches!(slot, Slot::InFlight { id, .. } if *id == self.id)
    }

    fn remove_own_slot(&self) {
        self.barrier.remove_if(&self.key, |_, slot| self.owns(slot));
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        if !self.settled {
            debug!(key = %self.key, "fetch abandoned, releasing barrier slot");
            self.remove_own_slot();
        }
        // `done` drops after this, waking the waiters.
    }
}
