//! An optional process-wide cache.
//!
//! Nothing is created implicitly: call [`init_default`] once at startup before using
//! [`remember`] or [`delete`], which otherwise fail with [`Error::Uninitialized`].

use std::sync::OnceLock;

use crate::cache::{Cache, Fetch};
use crate::config::CacheConfig;
use crate::error::{Error, Result};

static DEFAULT: OnceLock<Cache> = OnceLock::new();

/// Installs the default cache. Fails if it was already installed.
pub fn init_default(config: CacheConfig) -> Result<&'static Cache> {
    DEFAULT
        .set(Cache::with_config(config))
        .map_err(|_| Error::AlreadyInitialized)?;
    default_cache()
}

/// Gets the default cache, if [`init_default`] has been called.
pub fn default_cache() -> Result<&'static Cache> {
    DEFAULT.get().ok_or(Error::Uninitialized)
}

/// [`Cache::remember`] on the default cache.
pub async fn remember<T: Fetch>(dst: &mut T, key: &T::Key) -> Result<()> {
    default_cache()?.remember(dst, key).await
}

/// [`Cache::delete`] on the default cache.
pub fn delete<T: Fetch>(key: &T::Key) -> Result<()> {
    default_cache()?.delete::<T>(key);
    Ok(())
}
