//! Scoped driver acquisition.
//!
//! [`acquire`] obtains a handle from a [`Connector`] under the call's
//! [`Context`] and wraps it in a [`ConnectionGuard`], which closes the handle
//! when it goes out of scope on every exit path.

use std::ops::{Deref, DerefMut};

use remember_core::{ConnectError, Context};

use super::traits::{CacheDriver, Connector};

/// Owns a driver handle for the duration of one call and closes it on drop.
pub struct ConnectionGuard<D: CacheDriver> {
    driver: D,
}

impl<D: CacheDriver> ConnectionGuard<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }
}

impl<D: CacheDriver> Deref for ConnectionGuard<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.driver
    }
}

impl<D: CacheDriver> DerefMut for ConnectionGuard<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: CacheDriver> Drop for ConnectionGuard<D> {
    fn drop(&mut self) {
        self.driver.close();
    }
}

/// Obtain a scoped handle from `connector`.
///
/// Fails with [`ConnectError::Context`] if `ctx` is already done or finishes
/// while the connector is still waiting, whether or not the connector itself
/// watches the context.
pub async fn acquire<C: Connector>(
    connector: &C,
    ctx: &Context,
) -> Result<ConnectionGuard<C::Driver>, ConnectError> {
    let driver = ctx.run(connector.connect(ctx)).await??;
    Ok(ConnectionGuard::new(driver))
}
