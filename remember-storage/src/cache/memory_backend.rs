//! In-process cache backed by a concurrent hash map.
//!
//! Values are kept as live Rust values, type-erased behind `Arc<dyn Any>`,
//! so nothing is serialized. Entries expire lazily on lookup; a background
//! janitor also sweeps expired entries when the store is created inside a
//! tokio runtime.

use std::any::Any;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use remember_core::{ConnectError, Context, DriverError, DriverResult};
use tokio::time::Instant;
use tracing::debug;

use super::traits::{CacheDriver, Cacheable, Connector, Payload, StorageForm};

/// Map type shared by every handle of a [`MemoryStore`].
pub type MemoryMap = DashMap<String, MemoryEntry>;

/// A stored value with its optional expiry instant.
#[derive(Clone)]
pub struct MemoryEntry {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    /// Wrap `value`; `Duration::ZERO` means the entry never expires, as does
    /// an expiration too large to represent as an instant.
    pub fn new<T: Send + Sync + 'static>(value: T, expiration: Duration) -> Self {
        let expires_at = if expiration.is_zero() {
            None
        } else {
            Instant::now().checked_add(expiration)
        };
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
            expires_at,
        }
    }

    /// Whether the entry is past its expiry at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }
}

impl std::fmt::Debug for MemoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEntry")
            .field("type_name", &self.type_name)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// In-memory cache. Cloning yields another handle to the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<MemoryMap>,
}

impl MemoryStore {
    /// Create an empty store whose expired entries are swept every
    /// `cleanup_interval`.
    ///
    /// The sweep needs a tokio runtime; outside one (or with a zero
    /// interval) expired entries are only dropped when they are looked up
    /// or on [`MemoryStore::purge_expired`].
    pub fn new(cleanup_interval: Duration) -> Self {
        let store = Self::default();
        store.spawn_janitor(cleanup_interval);
        store
    }

    /// Wrap an existing map. No janitor is started.
    pub fn from_map(entries: Arc<MemoryMap>) -> Self {
        Self { entries }
    }

    /// The underlying map, shared with every handle.
    pub fn shared_map(&self) -> Arc<MemoryMap> {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries)
    }

    /// Remove `key` only if the entry under it is still expired at `now`.
    /// A write that lands between the lookup and the removal survives.
    fn evict_expired(&self, key: &str, now: Instant) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
    }

    fn spawn_janitor(&self, cleanup_interval: Duration) {
        if cleanup_interval.is_zero() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(target: "remember", "no tokio runtime; memory store janitor disabled");
            return;
        };

        let entries: Weak<MemoryMap> = Arc::downgrade(&self.entries);
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let removed = purge(&entries);
                if removed > 0 {
                    debug!(
                        target: "remember",
                        removed,
                        "memory store janitor swept expired entries"
                    );
                }
            }
        });
    }
}

fn purge(entries: &MemoryMap) -> usize {
    let now = Instant::now();
    let mut removed = 0;
    entries.retain(|_, entry| {
        if entry.is_expired(now) {
            removed += 1;
            false
        } else {
            true
        }
    });
    removed
}

#[async_trait]
impl Connector for MemoryStore {
    type Driver = MemoryStore;

    async fn connect(&self, _ctx: &Context) -> Result<MemoryStore, ConnectError> {
        Ok(self.clone())
    }
}

#[async_trait]
impl CacheDriver for MemoryStore {
    fn storage_form(&self) -> StorageForm {
        StorageForm::Value
    }

    async fn get<T: Cacheable>(&mut self, key: &str) -> DriverResult<Option<T>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };

        let now = Instant::now();
        if entry.is_expired(now) {
            drop(entry);
            self.evict_expired(key, now);
            return Ok(None);
        }

        match entry.value.downcast_ref::<T>() {
            Some(value) => Ok(Some(value.clone())),
            None => Err(DriverError::decode(
                key,
                format!(
                    "stored {} cannot be read as {}",
                    entry.type_name,
                    std::any::type_name::<T>()
                ),
            )),
        }
    }

    async fn set<T: Cacheable>(
        &mut self,
        key: &str,
        expiration: Duration,
        payload: Payload<'_, T>,
    ) -> DriverResult<()> {
        let entry = MemoryEntry::new(payload.value().clone(), expiration);
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn close(&mut self) {}

    async fn forget(&mut self, key: &str) -> DriverResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn forget_all(&mut self) -> DriverResult<()> {
        self.entries.clear();
        Ok(())
    }
}
