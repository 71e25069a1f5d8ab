//! Memcached backend.
//!
//! The `memcache` client is blocking, so every call runs on tokio's
//! blocking pool. Values are stored in the plain codec form.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use memcache::Client;
use remember_core::{ConfigError, ConnectError, Context, DriverError, DriverResult};

use super::codec;
use super::traits::{CacheDriver, Cacheable, Connector, Payload, StorageForm};

const BACKEND: &str = "memcached";

/// Longest key memcached accepts, in bytes.
pub const MAX_KEY_LEN: usize = 250;

/// Expirations longer than this are read by memcached as a Unix timestamp.
const RELATIVE_EXPIRY_LIMIT: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Memcached connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemcachedConfig {
    /// Server URLs, e.g. `memcache://127.0.0.1:11211`.
    pub servers: Vec<String>,
    /// Socket read/write timeout.
    pub timeout: Option<Duration>,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            servers: vec!["memcache://127.0.0.1:11211".to_string()],
            timeout: None,
        }
    }
}

impl MemcachedConfig {
    pub fn new<S: Into<String>>(servers: impl IntoIterator<Item = S>) -> Self {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REMEMBER_MEMCACHED_SERVERS`: comma separated server URLs
    ///   (default: memcache://127.0.0.1:11211)
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("REMEMBER_MEMCACHED_SERVERS") {
            Ok(raw) => Self::parse_servers(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    fn parse_servers(raw: &str) -> Result<Self, ConfigError> {
        let servers: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if servers.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "REMEMBER_MEMCACHED_SERVERS".to_string(),
                value: raw.to_string(),
                reason: "no servers listed".to_string(),
            });
        }
        Ok(Self::new(servers))
    }
}

/// Memcached-backed cache. Cloning shares the underlying client.
#[derive(Clone)]
pub struct MemcachedStore {
    client: Arc<Client>,
}

impl MemcachedStore {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Connect to the configured servers.
    pub fn from_config(config: &MemcachedConfig) -> Result<Self, ConnectError> {
        let client = Client::connect(config.servers.clone())
            .map_err(|e| ConnectError::unavailable(BACKEND, e))?;
        if let Some(timeout) = config.timeout {
            client
                .set_read_timeout(Some(timeout))
                .and_then(|_| client.set_write_timeout(Some(timeout)))
                .map_err(|e| ConnectError::unavailable(BACKEND, e))?;
        }
        Ok(Self::new(client))
    }

    async fn blocking<R, F>(&self, op: F) -> DriverResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&Client) -> Result<R, memcache::MemcacheError> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || op(&client))
            .await
            .map_err(|e| DriverError::backend(BACKEND, e))?
            .map_err(|e| DriverError::backend(BACKEND, e))
    }
}

/// Reject keys memcached would refuse: longer than 250 bytes, or holding
/// whitespace or control characters.
pub fn validate_key(key: &str) -> DriverResult<()> {
    if key.len() > MAX_KEY_LEN {
        return Err(DriverError::InvalidKey {
            key: key.to_string(),
            reason: format!("longer than {} bytes", MAX_KEY_LEN),
        });
    }
    if key.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(DriverError::InvalidKey {
            key: key.to_string(),
            reason: "contains whitespace or control characters".to_string(),
        });
    }
    Ok(())
}

/// Expiration value for the memcached protocol: `0` for none, seconds for
/// up to 30 days, an absolute Unix time beyond that.
pub fn expiration_for(expiration: Duration, now: SystemTime) -> u32 {
    if expiration.is_zero() {
        return 0;
    }
    let secs = if expiration.subsec_nanos() > 0 {
        expiration.as_secs().saturating_add(1)
    } else {
        expiration.as_secs()
    };
    if Duration::from_secs(secs) <= RELATIVE_EXPIRY_LIMIT {
        return secs as u32;
    }
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    u32::try_from(since_epoch.as_secs().saturating_add(secs)).unwrap_or(u32::MAX)
}

#[async_trait]
impl Connector for MemcachedStore {
    type Driver = MemcachedStore;

    async fn connect(&self, _ctx: &Context) -> Result<MemcachedStore, ConnectError> {
        Ok(self.clone())
    }
}

#[async_trait]
impl CacheDriver for MemcachedStore {
    fn storage_form(&self) -> StorageForm {
        StorageForm::Value
    }

    async fn get<T: Cacheable>(&mut self, key: &str) -> DriverResult<Option<T>> {
        validate_key(key)?;
        let owned = key.to_string();
        let raw: Option<Vec<u8>> = self.blocking(move |client| client.get(&owned)).await?;
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
        validate_key(key)?;
        let bytes = codec::encode(key, payload)?;
        let exp = expiration_for(expiration, SystemTime::now());
        let owned = key.to_string();
        self.blocking(move |client| client.set(&owned, &bytes[..], exp))
            .await
    }

    fn close(&mut self) {}

    async fn forget(&mut self, key: &str) -> DriverResult<()> {
        validate_key(key)?;
        let owned = key.to_string();
        self.blocking(move |client| client.delete(&owned).map(|_| ()))
            .await
    }

    async fn forget_all(&mut self) -> DriverResult<()> {
        self.blocking(|client| client.flush()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_length() {
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN)).is_ok());
        let err = validate_key(&"k".repeat(MAX_KEY_LEN + 1)).unwrap_err();
        assert!(matches!(err, DriverError::InvalidKey { .. }));
    }

    #[test]
    fn test_validate_key_characters() {
        assert!(validate_key("user:42").is_ok());
        assert!(validate_key("with space").is_err());
        assert!(validate_key("tab\there").is_err());
        assert!(validate_key("bell\u{7}").is_err());
    }

    #[test]
    fn test_expiration_for_relative_and_absolute() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        assert_eq!(expiration_for(Duration::ZERO, now), 0);
        assert_eq!(expiration_for(Duration::from_secs(600), now), 600);
        assert_eq!(expiration_for(Duration::from_millis(200), now), 1);
        assert_eq!(expiration_for(RELATIVE_EXPIRY_LIMIT, now), 2_592_000);

        let long = RELATIVE_EXPIRY_LIMIT + Duration::from_secs(1);
        assert_eq!(expiration_for(long, now), 1_700_000_000 + 2_592_001);
    }

    #[test]
    fn test_expiration_for_saturates() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(expiration_for(Duration::MAX, now), u32::MAX);
    }

    #[test]
    fn test_parse_servers() {
        let config =
            MemcachedConfig::parse_servers("memcache://a:11211, memcache://b:11211,").unwrap();
        assert_eq!(config.servers, vec!["memcache://a:11211", "memcache://b:11211"]);
        assert!(MemcachedConfig::parse_servers(" , ").is_err());
    }
}
