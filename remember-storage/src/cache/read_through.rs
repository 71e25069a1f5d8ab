//! Cache-aside orchestration.
//!
//! [`cache`] returns a cached value when one exists and otherwise calls the
//! fallback, writes its result back, and returns it. Cache faults never
//! reach the caller: a failed lookup is treated as a miss and a failed write
//! is only logged. The errors a caller can see are a failure to obtain a
//! connection and the fallback's own error.
//!
//! # Concurrency
//!
//! Calls for the same key are not coordinated. Concurrent misses each run
//! the fallback and each write back; the last write wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use remember_core::{registry, CacheError, Context, DriverResult, ForgetError, Options};

use super::connection::{self, ConnectionGuard};
use super::read::CacheRead;
use super::traits::{CacheDriver, Cacheable, Connector, Payload};

/// Return the value cached under `key`, or compute it with `fetch` and
/// cache it for `expiration` (`Duration::ZERO` = no expiration).
///
/// `options` of `None` means the defaults: cache enabled, no forced refresh,
/// no logger, no type registration.
///
/// # Order of checks
///
/// 1. `disable_cache_usage`: call `fetch` without touching the backend.
/// 2. Acquire a connection; failure aborts the call before `fetch` runs.
/// 3. Unless `use_fresh_data` is set, look the key up and return a hit.
/// 4. Call `fetch`; its error is returned as is and nothing is written.
/// 5. Optionally register the result type, then write the result back.
pub async fn cache<C, T, E, F, Fut>(
    ctx: &Context,
    connector: &C,
    key: &str,
    expiration: Duration,
    fetch: F,
    options: Option<&Options>,
) -> Result<CacheRead<T>, CacheError<E>>
where
    C: Connector,
    T: Cacheable,
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let defaults = Options::default();
    let options = options.unwrap_or(&defaults);
    let log = options.log_sink();

    if options.disable_cache_usage {
        log.debug(format_args!("[cache disabled] fetching from fallback key: {}", key));
        return match fetch(ctx.clone()).await {
            Ok(value) => Ok(CacheRead::from_fallback(value)),
            Err(e) => {
                log.debug(format_args!(
                    "[cache disabled] fallback failed for key: {} error: {}",
                    key, e
                ));
                Err(CacheError::Fallback(e))
            }
        };
    }

    let mut conn = match connection::acquire(connector, ctx).await {
        Ok(conn) => conn,
        Err(e) => {
            log.error(format_args!("could not obtain connection for cache: {}", e));
            return Err(CacheError::Connect(e));
        }
    };

    if options.use_fresh_data {
        log.debug(format_args!("fetching fresh data from fallback key: {}", key));
    } else {
        match conn.get::<T>(key).await {
            Ok(Some(value)) => {
                log.debug(format_args!("found in cache key: {}", key));
                return Ok(CacheRead::from_cache(value));
            }
            Ok(None) => {}
            Err(e) => {
                log.error(format_args!("could not fetch from cache key: {} error: {}", key, e));
            }
        }
        log.debug(format_args!("fetching from fallback key: {}", key));
    }

    let value = fetch(ctx.clone()).await.map_err(CacheError::Fallback)?;

    if options.register_type {
        if let Err(e) = registry::global().register::<T>() {
            log.error(format_args!("type registration failed: {}", e));
        }
    }

    if let Err(e) = write_back(&mut conn, key, expiration, &value).await {
        log.error(format_args!("could not store item to cache key: {} error: {}", key, e));
    }

    Ok(CacheRead::from_fallback(value))
}

async fn write_back<D: CacheDriver, T: Cacheable>(
    conn: &mut ConnectionGuard<D>,
    key: &str,
    expiration: Duration,
    value: &T,
) -> DriverResult<()> {
    let payload = Payload::new(conn.storage_form(), value);
    conn.set(key, expiration, payload).await
}

/// A connector bound to default options.
///
/// Backend choice is made once, at construction; every call then goes
/// through the same [`cache`] path.
///
/// ```ignore
/// let remember = Remember::new(MemoryStore::new(Duration::from_secs(600)))
///     .with_options(Options::new().with_tracing().with_only_errors(true));
///
/// let read = remember
///     .cache(&ctx, "user:42", Duration::from_secs(60), |ctx| load_user(ctx, 42))
///     .await?;
/// ```
pub struct Remember<C: Connector> {
    connector: Arc<C>,
    options: Options,
}

impl<C: Connector> Remember<C> {
    /// Bind `connector` with default options.
    pub fn new(connector: C) -> Self {
        Self::from_shared(Arc::new(connector))
    }

    /// Bind a connector that is already shared elsewhere.
    pub fn from_shared(connector: Arc<C>) -> Self {
        Self {
            connector,
            options: Options::default(),
        }
    }

    /// Replace the options used by [`Remember::cache`].
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Get the default options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Get the bound connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// [`cache`] with this instance's default options.
    pub async fn cache<T, E, F, Fut>(
        &self,
        ctx: &Context,
        key: &str,
        expiration: Duration,
        fetch: F,
    ) -> Result<CacheRead<T>, CacheError<E>>
    where
        T: Cacheable,
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        cache(ctx, &*self.connector, key, expiration, fetch, Some(&self.options)).await
    }

    /// [`cache`] with options for this call only.
    pub async fn cache_with<T, E, F, Fut>(
        &self,
        ctx: &Context,
        key: &str,
        expiration: Duration,
        fetch: F,
        options: &Options,
    ) -> Result<CacheRead<T>, CacheError<E>>
    where
        T: Cacheable,
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        cache(ctx, &*self.connector, key, expiration, fetch, Some(options)).await
    }

    /// Drop the entry for `key`.
    pub async fn forget(&self, ctx: &Context, key: &str) -> Result<(), ForgetError> {
        let mut conn = connection::acquire(&*self.connector, ctx).await?;
        conn.forget(key).await?;
        Ok(())
    }

    /// Drop every entry the backend holds.
    pub async fn forget_all(&self, ctx: &Context) -> Result<(), ForgetError> {
        let mut conn = connection::acquire(&*self.connector, ctx).await?;
        conn.forget_all().await?;
        Ok(())
    }
}

impl<C: Connector> Clone for Remember<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            options: self.options.clone(),
        }
    }
}
