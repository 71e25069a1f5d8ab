//! Orchestrator behaviour against a fault-injecting mock backend.
//!
//! Covers the order of checks in `cache`: cache disabling, connection
//! failure, forced refresh, soft lookup and write faults, fallback failure,
//! type registration, and connection release on every path.

use std::time::Duration;

use remember_core::registry;
use remember_storage::{cache, CacheError, Context, Options, StorageForm};
use remember_test_utils::{CountingFetch, FetchError, LogLevel, MockConnector, RecordingLogger};
use serde::{Deserialize, Serialize};

const TEN_MINUTES: Duration = Duration::from_secs(600);

fn ctx() -> Context {
    Context::background()
}

#[tokio::test]
async fn test_miss_stores_then_hit_returns_stored_value() {
    let backend = MockConnector::new();
    let fetch = CountingFetch::new();

    let first = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        fetch.returning("v1".to_string()),
        None,
    )
    .await
    .unwrap();
    assert_eq!(first.into_parts(), ("v1".to_string(), false));
    assert_eq!(backend.stored::<String>("key").as_deref(), Some("v1"));
    assert_eq!(backend.entry("key").unwrap().expiration, TEN_MINUTES);

    let second = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        fetch.returning("v2".to_string()),
        None,
    )
    .await
    .unwrap();
    assert_eq!(second.into_parts(), ("v1".to_string(), true));

    assert_eq!(fetch.calls(), 1);
    assert_eq!(backend.sets(), 1);
    assert!(backend.all_closed());
}

#[tokio::test]
async fn test_disabled_cache_bypasses_backend() {
    let backend = MockConnector::new();
    backend.seed("key", &"cached".to_string());
    let fetch = CountingFetch::new();
    let options = Options::new().with_cache_disabled(true);

    let read = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        fetch.returning("live".to_string()),
        Some(&options),
    )
    .await
    .unwrap();

    assert_eq!(read.into_parts(), ("live".to_string(), false));
    assert_eq!(backend.connects(), 0);
    assert_eq!(backend.gets(), 0);
    assert_eq!(backend.sets(), 0);
    assert_eq!(backend.stored::<String>("key").as_deref(), Some("cached"));
}

#[tokio::test]
async fn test_disabled_cache_wins_over_fresh_data() {
    let backend = MockConnector::new();
    backend.fail_connect(true);
    let options = Options::new().with_cache_disabled(true).with_fresh_data(true);

    let read = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        CountingFetch::new().returning(1u32),
        Some(&options),
    )
    .await
    .unwrap();
    assert_eq!(read.into_parts(), (1, false));
}

#[tokio::test]
async fn test_disabled_cache_propagates_fallback_error() {
    let backend = MockConnector::new();
    let options = Options::new().with_cache_disabled(true);

    let err = cache::<_, u32, _, _, _>(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        CountingFetch::new().failing("db down"),
        Some(&options),
    )
    .await
    .unwrap_err();

    assert_eq!(err.into_fallback(), Some(FetchError("db down".to_string())));
    assert_eq!(backend.connects(), 0);
}

#[tokio::test]
async fn test_fresh_data_skips_lookup_and_overwrites() {
    let backend = MockConnector::new();
    backend.seed("key", &"stale".to_string());
    let fetch = CountingFetch::new();
    let options = Options::new().with_fresh_data(true);

    let read = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        fetch.returning("fresh".to_string()),
        Some(&options),
    )
    .await
    .unwrap();

    assert_eq!(read.into_parts(), ("fresh".to_string(), false));
    assert_eq!(backend.gets(), 0);
    assert_eq!(fetch.calls(), 1);
    assert_eq!(backend.stored::<String>("key").as_deref(), Some("fresh"));
    assert!(backend.all_closed());
}

#[tokio::test]
async fn test_connect_failure_aborts_before_fallback() {
    let backend = MockConnector::new();
    backend.fail_connect(true);
    let fetch = CountingFetch::new();
    let logger = RecordingLogger::new();
    let options = Options::new().with_logger(logger.clone());

    let err = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        fetch.returning(7u32),
        Some(&options),
    )
    .await
    .unwrap_err();

    assert!(err.is_connect());
    assert!(matches!(err, CacheError::Connect(_)));
    assert_eq!(fetch.calls(), 0);
    assert!(logger.contains(LogLevel::Error, "could not obtain connection"));
}

#[tokio::test]
async fn test_get_error_is_treated_as_miss() {
    let backend = MockConnector::new();
    backend.seed("key", &1u32);
    backend.fail_get(true);
    let fetch = CountingFetch::new();
    let logger = RecordingLogger::new();
    let options = Options::new().with_logger(logger.clone());

    let read = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        fetch.returning(2u32),
        Some(&options),
    )
    .await
    .unwrap();

    assert_eq!(read.into_parts(), (2, false));
    assert_eq!(fetch.calls(), 1);
    assert_eq!(backend.stored::<u32>("key"), Some(2));
    assert!(logger.contains(LogLevel::Error, "could not fetch from cache key: key"));
}

#[tokio::test]
async fn test_corrupt_entry_is_treated_as_miss() {
    let backend = MockConnector::new();
    backend.seed_raw("key", "{not json");

    let read = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        CountingFetch::new().returning(5u32),
        None,
    )
    .await
    .unwrap();

    assert_eq!(read.into_parts(), (5, false));
    assert_eq!(backend.stored::<u32>("key"), Some(5));
}

#[tokio::test]
async fn test_set_error_does_not_change_result() {
    let backend = MockConnector::new();
    backend.fail_set(true);
    let logger = RecordingLogger::new();
    let options = Options::new().with_logger(logger.clone());

    let read = cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        CountingFetch::new().returning(9u32),
        Some(&options),
    )
    .await
    .unwrap();

    assert_eq!(read.into_parts(), (9, false));
    assert!(backend.is_empty());
    assert!(logger.contains(LogLevel::Error, "could not store item to cache key: key"));
    assert!(backend.all_closed());
}

#[tokio::test]
async fn test_fallback_error_skips_write_back() {
    let backend = MockConnector::new();
    let err = cache::<_, u32, _, _, _>(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        CountingFetch::new().failing("timeout"),
        None,
    )
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), "fetch failed: timeout");
    assert_eq!(backend.sets(), 0);
    assert!(backend.all_closed());
}

#[tokio::test]
async fn test_storage_form_is_passed_to_set() {
    let backend = MockConnector::new().with_storage_form(StorageForm::Tagged);

    cache(
        &ctx(),
        &backend,
        "key",
        TEN_MINUTES,
        CountingFetch::new().returning(1u8),
        None,
    )
    .await
    .unwrap();

    assert_eq!(backend.entry("key").unwrap().form, StorageForm::Tagged);
}

#[tokio::test]
async fn test_only_errors_suppresses_debug_lines() {
    let backend = MockConnector::new();
    let logger = RecordingLogger::new();
    let options = Options::new().with_logger(logger.clone());
    let quiet = Options::new().with_logger(logger.clone()).with_only_errors(true);

    cache(
        &ctx(),
        &backend,
        "a",
        TEN_MINUTES,
        CountingFetch::new().returning(1u8),
        Some(&options),
    )
    .await
    .unwrap();
    let chatty = logger.count(LogLevel::Debug);
    assert!(logger.contains(LogLevel::Debug, "fetching from fallback key: a"));

    cache(
        &ctx(),
        &backend,
        "a",
        TEN_MINUTES,
        CountingFetch::new().returning(1u8),
        Some(&quiet),
    )
    .await
    .unwrap();
    assert_eq!(logger.count(LogLevel::Debug), chatty);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    id: u64,
    display_name: String,
}

#[tokio::test]
async fn test_type_registration_is_best_effort() {
    let backend = MockConnector::new();
    let logger = RecordingLogger::new();
    let options = Options::new()
        .with_type_registration(true)
        .with_logger(logger.clone());
    let profile = Profile {
        id: 1,
        display_name: "Ada".to_string(),
    };

    let read = cache(
        &ctx(),
        &backend,
        "p",
        TEN_MINUTES,
        CountingFetch::new().returning(profile.clone()),
        Some(&options),
    )
    .await
    .unwrap();
    assert_eq!(read.into_value(), profile);
    assert!(registry::global().name_of::<Profile>().is_some());

    // A second registration of the same type is harmless.
    let again = cache(
        &ctx(),
        &backend,
        "p2",
        TEN_MINUTES,
        CountingFetch::new().returning(profile.clone()),
        Some(&options),
    )
    .await
    .unwrap();
    assert_eq!(again.into_value(), profile);
    assert_eq!(logger.count(LogLevel::Error), 0);
}

#[tokio::test]
async fn test_cancelled_context_fails_connection() {
    let backend = MockConnector::new();
    let (ctx, cancel) = Context::background().with_cancel();
    cancel.cancel();
    let fetch = CountingFetch::new();

    let err = cache(
        &ctx,
        &backend,
        "key",
        TEN_MINUTES,
        fetch.returning(1u8),
        None,
    )
    .await
    .unwrap_err();

    assert!(err.is_connect());
    assert_eq!(fetch.calls(), 0);
    assert_eq!(backend.connects(), 0);
}

#[tokio::test]
async fn test_fallback_receives_call_context() {
    let backend = MockConnector::new();
    let ctx = Context::background().with_timeout(Duration::from_secs(30));
    let deadline = ctx.deadline();

    let read = cache(
        &ctx,
        &backend,
        "key",
        TEN_MINUTES,
        |inner: Context| async move { Ok::<_, FetchError>(inner.deadline() == deadline) },
        None,
    )
    .await
    .unwrap();
    assert!(read.into_value());
}
