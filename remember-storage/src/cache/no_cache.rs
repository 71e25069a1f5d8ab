//! A backend that stores nothing.

use std::time::Duration;

use async_trait::async_trait;
use remember_core::{ConnectError, Context, DriverResult};

use super::traits::{CacheDriver, Cacheable, Connector, Payload, StorageForm};

/// Every lookup misses and every write is accepted and discarded, so each
/// `cache` call runs its fallback. Lets caching be switched off at
/// construction time without touching call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl NoCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for NoCache {
    type Driver = NoCache;

    async fn connect(&self, _ctx: &Context) -> Result<NoCache, ConnectError> {
        Ok(NoCache)
    }
}

#[async_trait]
impl CacheDriver for NoCache {
    fn storage_form(&self) -> StorageForm {
        StorageForm::Tagged
    }

    async fn get<T: Cacheable>(&mut self, _key: &str) -> DriverResult<Option<T>> {
        Ok(None)
    }

    async fn set<T: Cacheable>(
        &mut self,
        _key: &str,
        _expiration: Duration,
        _payload: Payload<'_, T>,
    ) -> DriverResult<()> {
        Ok(())
    }

    fn close(&mut self) {}

    async fn forget(&mut self, _key: &str) -> DriverResult<()> {
        Ok(())
    }

    async fn forget_all(&mut self) -> DriverResult<()> {
        Ok(())
    }
}
