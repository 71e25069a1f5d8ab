//! Cache-aside layer and its storage drivers.
//!
//! [`cache`] sits in front of a slow data source: it serves a stored value
//! when one exists and otherwise runs the caller's fallback and stores the
//! result. Backends plug in through [`Connector`] and [`CacheDriver`].
//!
//! # Backends
//!
//! | backend            | storage form | notes                                  |
//! |--------------------|--------------|----------------------------------------|
//! | [`MemoryStore`]    | value        | live values, lazy expiry plus janitor  |
//! | [`CostStore`]      | value        | cost budget, refuses oversized entries |
//! | `RedisStore`       | tagged       | feature `redis`, pooled connections    |
//! | `MemcachedStore`   | value        | feature `memcached`, 250 byte keys     |
//! | [`NoCache`]        | tagged       | always misses                          |
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryStore::new(Duration::from_secs(600));
//! let options = Options::new().with_tracing();
//!
//! let ttl = Duration::from_secs(600);
//! let read = cache(&ctx, &store, "key", ttl, slow_query, Some(&options)).await?;
//! if read.found() {
//!     tracing::debug!("served from cache");
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod cost_backend;
#[cfg(feature = "memcached")]
pub mod memcached_backend;
pub mod memory_backend;
pub mod no_cache;
pub mod read;
pub mod read_through;
#[cfg(feature = "redis")]
pub mod redis_backend;
pub mod traits;

pub use connection::{acquire, ConnectionGuard};
pub use cost_backend::{CostStore, CostStoreConfig};
#[cfg(feature = "memcached")]
pub use memcached_backend::{MemcachedConfig, MemcachedStore};
pub use memory_backend::{MemoryEntry, MemoryMap, MemoryStore};
pub use no_cache::NoCache;
pub use read::{CacheRead, ReadSource};
pub use read_through::{cache, Remember};
#[cfg(feature = "redis")]
pub use redis_backend::{RedisConfig, RedisConnection, RedisStore};
pub use traits::{CacheDriver, Cacheable, Connector, Payload, StorageForm};
