//! remember Test Utilities
//!
//! Shared test infrastructure for the remember workspace:
//! - A mock connector with injectable faults and call counters
//! - Fallback and logger doubles that record how they were used
//! - Proptest generators for keys and cached values
//! - Tracing setup for tests

pub use remember_core::{
    CacheError, ConnectError, Context, DriverError, DriverResult, ForgetError, LogLevel, Logger,
    Options,
};
pub use remember_storage::{CacheDriver, CacheRead, Cacheable, Connector, Payload, StorageForm};

use std::collections::HashMap;
use std::fmt;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MOCK DRIVER
// ============================================================================

/// What the mock last stored under a key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub json: String,
    pub expiration: Duration,
    pub form: StorageForm,
}

#[derive(Default)]
struct MockState {
    entries: Mutex<HashMap<String, StoredEntry>>,
    form: Mutex<StorageForm>,
    fail_connect: AtomicBool,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_forget: AtomicBool,
    connects: AtomicUsize,
    gets: AtomicUsize,
    sets: AtomicUsize,
    closes: AtomicUsize,
}

/// In-memory connector whose handles all share one map.
///
/// Values are stored as JSON so that a seeded entry can be made unreadable
/// with [`MockConnector::seed_raw`].
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `form` from [`CacheDriver::storage_form`].
    pub fn with_storage_form(self, form: StorageForm) -> Self {
        *lock(&self.state.form) = form;
        self
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get(&self, fail: bool) {
        self.state.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set(&self, fail: bool) {
        self.state.fail_set.store(fail, Ordering::SeqCst);
    }

    /// Make `forget` and `forget_all` report a backend error.
    pub fn fail_forget(&self, fail: bool) {
        self.state.fail_forget.store(fail, Ordering::SeqCst);
    }

    /// Store `value` directly, bypassing the counters.
    pub fn seed<T: Serialize>(&self, key: &str, value: &T) {
        let json = serde_json::to_string(value).unwrap_or_default();
        self.seed_raw(key, json);
    }

    /// Store raw text as the JSON body for `key`.
    pub fn seed_raw(&self, key: &str, json: impl Into<String>) {
        lock(&self.state.entries).insert(
            key.to_string(),
            StoredEntry {
                json: json.into(),
                expiration: Duration::ZERO,
                form: StorageForm::Value,
            },
        );
    }

    /// Decode what is currently stored under `key`.
    pub fn stored<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = lock(&self.state.entries).get(key)?.json.clone();
        serde_json::from_str(&json).ok()
    }

    pub fn entry(&self, key: &str) -> Option<StoredEntry> {
        lock(&self.state.entries).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.state.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.state.sets.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Every handle that was handed out has been closed.
    pub fn all_closed(&self) -> bool {
        self.connects() == self.closes()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Driver = MockDriver;

    async fn connect(&self, _ctx: &Context) -> Result<MockDriver, ConnectError> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectError::unavailable("mock", "connection refused"));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockDriver {
            state: Arc::clone(&self.state),
            closed: false,
        })
    }
}

/// Handle produced by [`MockConnector`].
pub struct MockDriver {
    state: Arc<MockState>,
    closed: bool,
}

#[async_trait]
impl CacheDriver for MockDriver {
    fn storage_form(&self) -> StorageForm {
        *lock(&self.state.form)
    }

    async fn get<T: Cacheable>(&mut self, key: &str) -> DriverResult<Option<T>> {
        self.state.gets.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_get.load(Ordering::SeqCst) {
            return Err(DriverError::backend("mock", "get failed"));
        }
        let json = match lock(&self.state.entries).get(key) {
            Some(entry) => entry.json.clone(),
            None => return Ok(None),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| DriverError::decode(key, e))
    }

    async fn set<T: Cacheable>(
        &mut self,
        key: &str,
        expiration: Duration,
        payload: Payload<'_, T>,
    ) -> DriverResult<()> {
        self.state.sets.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_set.load(Ordering::SeqCst) {
            return Err(DriverError::backend("mock", "set failed"));
        }
        let json = serde_json::to_string(payload.value()).map_err(|e| DriverError::encode(key, e))?;
        lock(&self.state.entries).insert(
            key.to_string(),
            StoredEntry {
                json,
                expiration,
                form: payload.form(),
            },
        );
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn forget(&mut self, key: &str) -> DriverResult<()> {
        if self.state.fail_forget.load(Ordering::SeqCst) {
            return Err(DriverError::backend("mock", "delete failed"));
        }
        lock(&self.state.entries).remove(key);
        Ok(())
    }

    async fn forget_all(&mut self) -> DriverResult<()> {
        if self.state.fail_forget.load(Ordering::SeqCst) {
            return Err(DriverError::backend("mock", "flush failed"));
        }
        lock(&self.state.entries).clear();
        Ok(())
    }
}

// ============================================================================
// FALLBACK AND LOGGER DOUBLES
// ============================================================================

/// Error produced by [`CountingFetch::failing`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch failed: {0}")]
pub struct FetchError(pub String);

/// Builds fallbacks that count how often they run.
#[derive(Clone, Default)]
pub struct CountingFetch {
    calls: Arc<AtomicUsize>,
}

impl CountingFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A fallback that succeeds with `value`.
    pub fn returning<T>(&self, value: T) -> impl FnOnce(Context) -> Ready<Result<T, FetchError>> {
        let calls = Arc::clone(&self.calls);
        move |_ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Ok(value))
        }
    }

    /// A fallback that fails with `message`.
    pub fn failing<T>(
        &self,
        message: &str,
    ) -> impl FnOnce(Context) -> Ready<Result<T, FetchError>> {
        let calls = Arc::clone(&self.calls);
        let message = message.to_string();
        move |_ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Err(FetchError(message)))
        }
    }
}

/// Logger that keeps every line it receives.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        lock(&self.lines).clone()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        lock(&self.lines).iter().filter(|(l, _)| *l == level).count()
    }

    /// Whether any line at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        lock(&self.lines)
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        lock(&self.lines).push((level, args.to_string()));
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache keys and values.

    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    /// A printable key without whitespace, valid for every backend.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9:_.-]{1,64}"
    }

    /// A cache value as a fallback might produce it.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Record {
        pub id: u64,
        pub name: String,
        pub tags: Vec<String>,
    }

    pub fn arb_record() -> impl Strategy<Value = Record> {
        (
            any::<u64>(),
            "[a-z ]{0,24}",
            prop::collection::vec("[a-z]{1,8}", 0..4),
        )
            .prop_map(|(id, name, tags)| Record { id, name, tags })
    }

    /// Expirations from none up to an hour, in whole seconds.
    pub fn arb_expiration() -> impl Strategy<Value = std::time::Duration> {
        (0u64..3600).prop_map(std::time::Duration::from_secs)
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to debug output for the `remember` target.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("remember=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// TESTS
// ============================================================================
