//! Driver contract and cacheable value marker.
//!
//! This module defines the traits that every storage backend implements
//! and the bound that values must satisfy to be cached.

use std::time::Duration;

use async_trait::async_trait;
use remember_core::{ConnectError, Context, DriverResult};
use serde::{de::DeserializeOwned, Serialize};

/// Marker trait for values that can be cached.
///
/// Blanket-implemented for every type that can be cloned, serialized, and
/// shared across tasks. Networked drivers rely on the serde bounds, the
/// in-process drivers on `Clone + 'static`.
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// How a driver wants values handed to [`CacheDriver::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageForm {
    /// Store the bare value.
    #[default]
    Value,
    /// Store the value tagged with its registered type name so the dynamic
    /// type can be checked when it is read back.
    Tagged,
}

/// A value on its way into a driver, in the form the driver asked for.
#[derive(Debug)]
pub enum Payload<'a, T> {
    Value(&'a T),
    Tagged(&'a T),
}

impl<T> Clone for Payload<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Payload<'_, T> {}

impl<'a, T> Payload<'a, T> {
    /// Wrap `value` in the given form.
    pub fn new(form: StorageForm, value: &'a T) -> Self {
        match form {
            StorageForm::Value => Payload::Value(value),
            StorageForm::Tagged => Payload::Tagged(value),
        }
    }

    /// Get the value to store.
    pub fn value(&self) -> &'a T {
        match *self {
            Payload::Value(v) | Payload::Tagged(v) => v,
        }
    }

    /// Get the form the value is stored in.
    pub fn form(&self) -> StorageForm {
        match self {
            Payload::Value(_) => StorageForm::Value,
            Payload::Tagged(_) => StorageForm::Tagged,
        }
    }
}

/// A live handle to a cache backend.
///
/// # Lookup results
///
/// - `Ok(None)` is a clean miss.
/// - `Ok(Some(v))` is a hit.
/// - `Err(DriverError::Decode { .. })` means the entry existed but could not
///   be read back as `T`.
/// - any other `Err` is a backend fault.
///
/// # Expiration
///
/// `Duration::ZERO` means the entry does not expire.
#[async_trait]
pub trait CacheDriver: Send {
    /// The form in which this driver wants values passed to `set`.
    fn storage_form(&self) -> StorageForm;

    /// Get a value from the cache if the key exists.
    async fn get<T: Cacheable>(&mut self, key: &str) -> DriverResult<Option<T>>;

    /// Store a value under `key`.
    async fn set<T: Cacheable>(
        &mut self,
        key: &str,
        expiration: Duration,
        payload: Payload<'_, T>,
    ) -> DriverResult<()>;

    /// Release the handle. Calling it more than once is harmless.
    fn close(&mut self);

    /// Remove the value stored under `key`.
    async fn forget(&mut self, key: &str) -> DriverResult<()>;

    /// Remove every value from the cache.
    async fn forget_all(&mut self) -> DriverResult<()>;
}

/// Provides driver handles, e.g. by checking a connection out of a pool.
///
/// Backends without a pooling concept hand out a cheap clone of themselves.
#[async_trait]
pub trait Connector: Send + Sync {
    type Driver: CacheDriver;

    /// Obtain a handle. Pooled implementations may wait for a free slot and
    /// should give up once `ctx` is done.
    async fn connect(&self, ctx: &Context) -> Result<Self::Driver, ConnectError>;
}
