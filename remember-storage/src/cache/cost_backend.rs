//! Bounded in-process cache with cost-based admission.
//!
//! Built on `moka`'s async cache. The capacity is a total cost budget and
//! every entry carries a cost; moka evicts by its own TinyLFU policy once
//! the budget is exceeded. Entries have individual time-to-live values.
//!
//! Eviction and expiry run as moka maintenance tasks, so writes become
//! visible to size counters only after pending tasks have run.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use remember_core::{env_parse, ConfigError, ConnectError, Context, DriverError, DriverResult};
use tracing::debug;

use super::traits::{CacheDriver, Cacheable, Connector, Payload, StorageForm};

/// Default total cost budget.
const DEFAULT_MAX_COST: u64 = 10_000;

/// Default cost charged for a single entry.
const DEFAULT_ENTRY_COST: u32 = 1;

/// Configuration for [`CostStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostStoreConfig {
    /// Total cost the cache may hold before it starts evicting.
    pub max_cost: u64,
    /// Cost charged for each stored entry.
    pub entry_cost: u32,
}

impl Default for CostStoreConfig {
    fn default() -> Self {
        Self {
            max_cost: DEFAULT_MAX_COST,
            entry_cost: DEFAULT_ENTRY_COST,
        }
    }
}

impl CostStoreConfig {
    /// Set the total cost budget.
    pub fn with_max_cost(mut self, max_cost: u64) -> Self {
        self.max_cost = max_cost;
        self
    }

    /// Set the cost charged for each entry.
    pub fn with_entry_cost(mut self, entry_cost: u32) -> Self {
        self.entry_cost = entry_cost;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REMEMBER_COST_MAX`: total cost budget (default: 10000)
    /// - `REMEMBER_COST_ENTRY`: cost per entry (default: 1)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_cost: env_parse("REMEMBER_COST_MAX")?.unwrap_or(defaults.max_cost),
            entry_cost: env_parse("REMEMBER_COST_ENTRY")?.unwrap_or(defaults.entry_cost),
        })
    }
}

#[derive(Clone)]
struct CostEntry {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    cost: u32,
    ttl: Option<Duration>,
}

struct PerEntryTtl;

impl Expiry<String, CostEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CostEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CostEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Cost-bounded in-memory cache. Cloning yields another handle to the same
/// cache.
#[derive(Clone)]
pub struct CostStore {
    cache: Cache<String, CostEntry>,
    config: CostStoreConfig,
}

impl CostStore {
    /// Create a store with the given budget.
    pub fn new(config: CostStoreConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_cost)
            .weigher(|_key: &String, entry: &CostEntry| entry.cost)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache, config }
    }

    pub fn config(&self) -> &CostStoreConfig {
        &self.config
    }

    /// Number of entries, as of the last maintenance run.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Total cost held, as of the last maintenance run.
    pub fn total_cost(&self) -> u64 {
        self.cache.weighted_size()
    }

    /// Run pending eviction and expiry work now.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for CostStore {
    fn default() -> Self {
        Self::new(CostStoreConfig::default())
    }
}

#[async_trait]
impl Connector for CostStore {
    type Driver = CostStore;

    async fn connect(&self, _ctx: &Context) -> Result<CostStore, ConnectError> {
        Ok(self.clone())
    }
}

#[async_trait]
impl CacheDriver for CostStore {
    fn storage_form(&self) -> StorageForm {
        StorageForm::Value
    }

    async fn get<T: Cacheable>(&mut self, key: &str) -> DriverResult<Option<T>> {
        let Some(entry) = self.cache.get(key).await else {
            return Ok(None);
        };
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

    /// Refused with [`DriverError::Dropped`] when the entry alone would
    /// exceed the cost budget.
    async fn set<T: Cacheable>(
        &mut self,
        key: &str,
        expiration: Duration,
        payload: Payload<'_, T>,
    ) -> DriverResult<()> {
        let cost = self.config.entry_cost;
        if u64::from(cost) > self.config.max_cost {
            debug!(
                target: "remember",
                key,
                cost,
                max_cost = self.config.max_cost,
                "entry exceeds cost budget, dropped"
            );
            return Err(DriverError::Dropped {
                key: key.to_string(),
            });
        }

        let entry = CostEntry {
            value: Arc::new(payload.value().clone()),
            type_name: std::any::type_name::<T>(),
            cost,
            ttl: (!expiration.is_zero()).then_some(expiration),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    fn close(&mut self) {}

    async fn forget(&mut self, key: &str) -> DriverResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    /// Not atomic: writes racing with the flush may survive it.
    async fn forget_all(&mut self) -> DriverResult<()> {
        self.cache.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let mut store = CostStore::default();
        store
            .set("k", Duration::ZERO, Payload::Value(&vec![1u8, 2, 3]))
            .await
            .unwrap();

        let got: Option<Vec<u8>> = store.get("k").await.unwrap();
        assert_eq!(got, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_oversized_entry_is_dropped() {
        let config = CostStoreConfig::default().with_max_cost(2).with_entry_cost(5);
        let mut store = CostStore::new(config);
        let err = store
            .set("k", Duration::ZERO, Payload::Value(&1u8))
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::Dropped { ref key } if key == "k"));
        assert_eq!(store.get::<u8>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cost_is_tracked() {
        let mut store = CostStore::new(CostStoreConfig::default().with_entry_cost(3));
        store
            .set("a", Duration::ZERO, Payload::Value(&1u8))
            .await
            .unwrap();
        store
            .set("b", Duration::ZERO, Payload::Value(&2u8))
            .await
            .unwrap();
        store.run_pending_tasks().await;

        assert_eq!(store.entry_count(), 2);
        assert_eq!(store.total_cost(), 6);
    }

    #[tokio::test]
    async fn test_ttl_expires_entry() {
        let mut store = CostStore::default();
        store
            .set("k", Duration::from_millis(50), Payload::Value(&1u8))
            .await
            .unwrap();
        assert_eq!(store.get::<u8>("k").await.unwrap(), Some(1));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(store.get::<u8>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_decode_error() {
        let mut store = CostStore::default();
        store
            .set("k", Duration::ZERO, Payload::Value(&1u8))
            .await
            .unwrap();
        assert!(store.get::<String>("k").await.unwrap_err().is_decode());
    }

    #[tokio::test]
    async fn test_forget_and_forget_all() {
        let mut store = CostStore::default();
        store
            .set("a", Duration::ZERO, Payload::Value(&1u8))
            .await
            .unwrap();
        store
            .set("b", Duration::ZERO, Payload::Value(&2u8))
            .await
            .unwrap();

        store.forget("a").await.unwrap();
        assert_eq!(store.get::<u8>("a").await.unwrap(), None);

        store.forget_all().await.unwrap();
        assert_eq!(store.get::<u8>("b").await.unwrap(), None);
    }
}
