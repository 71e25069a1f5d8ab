//! remember Storage - Cache-Aside Orchestration and Drivers
//!
//! Wraps a slow computation with a cache lookup. The orchestrator lives in
//! [`cache::read_through`]; the backends live beside it in [`cache`].

pub mod cache;

pub use cache::{
    acquire, cache, CacheDriver, CacheRead, Cacheable, ConnectionGuard, Connector, CostStore,
    CostStoreConfig, MemoryEntry, MemoryMap, MemoryStore, NoCache, Payload, ReadSource, Remember,
    StorageForm,
};
#[cfg(feature = "memcached")]
pub use cache::{MemcachedConfig, MemcachedStore};
#[cfg(feature = "redis")]
pub use cache::{RedisConfig, RedisConnection, RedisStore};

// Shared types callers need alongside the orchestrator.
pub use remember_core::{
    CacheError, ConnectError, Context, DriverError, DriverResult, ForgetError, Options,
};
