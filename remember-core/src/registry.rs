//! Process-wide registry of value types stored in tagged form.
//!
//! Drivers that store values tagged with their type name (see
//! `StorageForm::Tagged` in remember-storage) can only encode types that have
//! been registered here, and check on decode that the stored name maps to
//! the type being requested.
//!
//! Registering the same type under the same name twice is harmless.
//! Conflicting registrations are reported as [`RegistrationError`] and leave
//! the registry unchanged.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::error::RegistrationError;

#[derive(Debug, Clone)]
struct Registered {
    type_id: TypeId,
    type_name: &'static str,
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_name: HashMap<String, Registered>,
    by_type: HashMap<TypeId, String>,
}

/// Name <-> type mapping for tagged values.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

static GLOBAL: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

/// The registry shared by every driver in the process.
pub fn global() -> &'static TypeRegistry {
    &GLOBAL
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its Rust type name.
    pub fn register<T: 'static>(&self) -> Result<(), RegistrationError> {
        self.register_name::<T>(type_name::<T>())
    }

    /// Register `T` under `name`.
    pub fn register_name<T: 'static>(&self, name: &str) -> Result<(), RegistrationError> {
        let type_id = TypeId::of::<T>();
        let mut inner = self
            .inner
            .write()
            .map_err(|_| RegistrationError::LockPoisoned)?;

        if let Some(existing) = inner.by_name.get(name) {
            if existing.type_id == type_id {
                return Ok(());
            }
            return Err(RegistrationError::NameInUse {
                name: name.to_string(),
                existing: existing.type_name.to_string(),
            });
        }
        if let Some(existing) = inner.by_type.get(&type_id) {
            return Err(RegistrationError::TypeAlreadyNamed {
                type_name: type_name::<T>().to_string(),
                existing: existing.clone(),
            });
        }

        inner.by_name.insert(
            name.to_string(),
            Registered {
                type_id,
                type_name: type_name::<T>(),
            },
        );
        inner.by_type.insert(type_id, name.to_string());
        tracing::debug!(name, type_name = type_name::<T>(), "registered cache value type");
        Ok(())
    }

    /// Name `T` was registered under, if any.
    pub fn name_of<T: 'static>(&self) -> Option<String> {
        let inner = self.inner.read().ok()?;
        inner.by_type.get(&TypeId::of::<T>()).cloned()
    }

    /// Whether `name` is registered for exactly `T`.
    pub fn resolves_to<T: 'static>(&self, name: &str) -> Option<bool> {
        let inner = self.inner.read().ok()?;
        inner
            .by_name
            .get(name)
            .map(|registered| registered.type_id == TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.by_name.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invoice;
    struct Receipt;

    #[test]
    fn test_register_is_idempotent() {
        let registry = TypeRegistry::new();
        assert!(registry.register::<Invoice>().is_ok());
        assert!(registry.register::<Invoice>().is_ok());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.name_of::<Invoice>().as_deref(),
            Some(type_name::<Invoice>())
        );
    }

    #[test]
    fn test_name_conflict_is_rejected() {
        let registry = TypeRegistry::new();
        registry.register_name::<Invoice>("doc").unwrap();

        let err = registry.register_name::<Receipt>("doc").unwrap_err();
        assert!(matches!(err, RegistrationError::NameInUse { .. }));
        assert_eq!(registry.resolves_to::<Invoice>("doc"), Some(true));
        assert_eq!(registry.resolves_to::<Receipt>("doc"), Some(false));
    }

    #[test]
    fn test_renaming_a_type_is_rejected() {
        let registry = TypeRegistry::new();
        registry.register_name::<Invoice>("invoice").unwrap();

        let err = registry.register_name::<Invoice>("bill").unwrap_err();
        assert!(matches!(err, RegistrationError::TypeAlreadyNamed { .. }));
        assert_eq!(registry.resolves_to::<Invoice>("bill"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_name() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.resolves_to::<Invoice>("nope"), None);
        assert_eq!(registry.name_of::<Invoice>(), None);
    }
}
