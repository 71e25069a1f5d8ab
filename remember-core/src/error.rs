//! Error types for remember operations

use thiserror::Error;

/// Context termination reasons.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Failure to obtain a driver handle from a connector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("{backend} connection unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("connection aborted: {0}")]
    Context(#[from] ContextError),
}

impl ConnectError {
    pub fn unavailable(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors reported by a storage driver.
///
/// None of these abort a `cache` call: lookups that fail are treated as a
/// miss and failed writes are logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("{backend} error: {reason}")]
    Backend { backend: String, reason: String },

    #[error("could not encode value for key {key}: {reason}")]
    Encode { key: String, reason: String },

    /// The entry exists but could not be turned back into the requested type.
    #[error("could not decode cached value for key {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("item dropped for key {key}")]
    Dropped { key: String },

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("connection already closed")]
    Closed,
}

impl DriverError {
    pub fn backend(backend: impl Into<String>, reason: impl ToString) -> Self {
        Self::Backend {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(key: &str, reason: impl ToString) -> Self {
        Self::Decode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn encode(key: &str, reason: impl ToString) -> Self {
        Self::Encode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True when the entry was present but unreadable.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Type registration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("type name {name} already registered for {existing}")]
    NameInUse { name: String, existing: String },

    #[error("type {type_name} already registered under name {existing}")]
    TypeAlreadyNamed { type_name: String, existing: String },

    #[error("type registry lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Error returned by the cache-aside orchestrator.
///
/// Only connection failures and fallback failures ever reach the caller.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Fallback(E),
}

impl<E> CacheError<E> {
    /// Returns the fallback's own error, if that is what failed.
    pub fn into_fallback(self) -> Option<E> {
        match self {
            Self::Fallback(e) => Some(e),
            Self::Connect(_) => None,
        }
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

/// Error returned when dropping cached entries outside the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForgetError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub type DriverResult<T> = Result<T, DriverError>;

// =============================================================================
// TESTS
// =============================================================================
