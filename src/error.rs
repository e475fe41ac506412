use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::key::CacheKey;

/// A value source failure, shared between every caller that waited on the same fetch.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the cache.
///
/// `Error` is cheap to clone: a failed fetch is recorded once and replayed to every caller that
/// observes it until the next rotation.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The value source returned an error.
    #[error("failed to fetch {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: SharedError,
    },
    /// The key was invalidated with `delete` and has not been rotated out yet.
    #[error("{key} is deleted")]
    Deleted { key: String },
    /// `remember_timeout` gave up waiting.
    #[error("timed out after {timeout:?} remembering {key}")]
    Timeout { key: String, timeout: Duration },
    #[error("default cache is not initialized")]
    Uninitialized,
    #[error("default cache is already initialized")]
    AlreadyInitialized,
}

impl Error {
    pub(crate) fn fetch<E>(key: &CacheKey, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Fetch {
            key: key.to_string(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn deleted(key: &CacheKey) -> Self {
        Self::Deleted { key: key.to_string() }
    }

    /// Returns true for the tombstone left behind by `delete`.
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
