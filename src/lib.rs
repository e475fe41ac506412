//! A generational memoization cache with single-flight fetches
//!
//! This crate provides a `Cache` that remembers the results of expensive fetches (database rows,
//! remote calls). Entries are not expired one by one: the whole current generation is demoted
//! once per rotation interval and dropped at the next one, so a value is never served for more
//! than two intervals. Concurrent misses on the same key share a single fetch, and a failed fetch
//! is replayed to every caller until the next rotation.
//!
//! ```
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! use gencache::{Cache, Fetch};
//!
//! #[derive(Clone, Default)]
//! struct Greeting(String);
//!
//! impl Fetch for Greeting {
//!     type Key = str;
//!     type Error = Infallible;
//!
//!     async fn fetch(&self, key: &str) -> Result<Self, Infallible> {
//!         Ok(Greeting(format!("hello, {key}")))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> gencache::Result<()> {
//! let cache = Cache::new(Duration::from_secs(60));
//! let mut greeting = Greeting::default();
//! cache.remember(&mut greeting, "world").await?;
//! assert_eq!(greeting.0, "hello, world");
//! # Ok(())
//! # }
//! ```

mod barrier;
pub mod cache;
pub mod config;
pub mod error;
mod generation;
pub mod global;
pub mod key;

pub use cache::{Cache, Fetch};
pub use config::{CacheConfig, Invalidation};
pub use error::{Error, Result, SharedError};
pub use global::{default_cache, delete, init_default, remember};
pub use key::CacheKey;
