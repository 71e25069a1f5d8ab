//! Redis backend over a `deadpool-redis` connection pool.
//!
//! Each `cache` call checks one connection out of the pool and returns it
//! when the call finishes. Values are stored in the tagged codec form so
//! that reads can verify the stored type against the requested one.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use remember_core::{env_parse, ConfigError, ConnectError, Context, DriverError, DriverResult};
use tracing::{debug, warn};

use super::codec;
use super::traits::{CacheDriver, Cacheable, Connector, Payload, StorageForm};

const BACKEND: &str = "redis";

/// Redis pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
    /// Applied to waiting for, creating, and recycling pooled connections.
    pub timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 16,
            timeout: Duration::from_millis(5000),
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REMEMBER_REDIS_URL`: connection URL (default: redis://127.0.0.1:6379)
    /// - `REMEMBER_REDIS_POOL_SIZE`: maximum pooled connections (default: 16)
    /// - `REMEMBER_REDIS_TIMEOUT_MS`: pool timeouts in milliseconds (default: 5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("REMEMBER_REDIS_URL") {
            config.url = url;
        }
        if let Some(pool_size) = env_parse("REMEMBER_REDIS_POOL_SIZE")? {
            config.pool_size = pool_size;
        }
        if let Some(millis) = env_parse::<u64>("REMEMBER_REDIS_TIMEOUT_MS")? {
            config.timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }
}

/// Connector handing out pooled Redis connections.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from `config`. No connection is opened until the first
    /// checkout.
    pub fn from_config(config: &RedisConfig) -> Result<Self, ConnectError> {
        let mut redis_config = Config::from_url(&config.url);
        let mut pool_config = redis_config.get_pool_config();
        pool_config.max_size = config.pool_size;
        pool_config.timeouts.wait = Some(config.timeout);
        pool_config.timeouts.create = Some(config.timeout);
        pool_config.timeouts.recycle = Some(config.timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ConnectError::unavailable(BACKEND, e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl Connector for RedisStore {
    type Driver = RedisConnection;

    async fn connect(&self, ctx: &Context) -> Result<RedisConnection, ConnectError> {
        let conn = ctx.run(self.pool.get()).await?.map_err(|e| {
            warn!(target: "remember", error = %e, "redis pool checkout failed");
            ConnectError::unavailable(BACKEND, e)
        })?;
        Ok(RedisConnection { conn: Some(conn) })
    }
}

/// One pooled connection. Returned to the pool on [`CacheDriver::close`]
/// or when dropped.
pub struct RedisConnection {
    conn: Option<deadpool_redis::Connection>,
}

impl RedisConnection {
    fn live(&mut self) -> DriverResult<&mut deadpool_redis::Connection> {
        self.conn.as_mut().ok_or(DriverError::Closed)
    }
}

/// Seconds for `SET .. EX`. Redis has no sub-second `EX`, so any remainder
/// rounds up.
fn expire_seconds(expiration: Duration) -> u64 {
    let secs = expiration.as_secs();
    if expiration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

fn backend_error(e: redis::RedisError) -> DriverError {
    DriverError::backend(BACKEND, e)
}

#[async_trait]
impl CacheDriver for RedisConnection {
    fn storage_form(&self) -> StorageForm {
        StorageForm::Tagged
    }

    async fn get<T: Cacheable>(&mut self, key: &str) -> DriverResult<Option<T>> {
        let conn = self.live()?;
        let raw: Option<Vec<u8>> = conn.get(key).await.map_err(backend_error)?;
        match raw {
            Some(bytes) => codec::decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn set<T: Cacheable>(
        &mut self,
        key: &str,
        expiration: Duration,
        payload: Payload<'_, T>,
    ) -> DriverResult<()> {
        let bytes = codec::encode(key, payload)?;
        let conn = self.live()?;
        if expiration.is_zero() {
            let _: () = conn.set(key, bytes).await.map_err(backend_error)?;
        } else {
            let _: () = conn
                .set_ex(key, bytes, expire_seconds(expiration))
                .await
                .map_err(backend_error)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!(target: "remember", "redis connection returned to pool");
        }
    }

    async fn forget(&mut self, key: &str) -> DriverResult<()> {
        let conn = self.live()?;
        let _: () = conn.del(key).await.map_err(backend_error)?;
        Ok(())
    }

    async fn forget_all(&mut self) -> DriverResult<()> {
        let conn = self.live()?;
        let _: () = redis::cmd("FLUSHDB")
            .query_async(conn)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}
