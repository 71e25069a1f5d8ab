//! remember Core - Shared Types
//!
//! Types shared by the orchestrator, the storage drivers, and callers:
//! per-call [`Options`], the call [`Context`], the error taxonomy, the
//! [`Logger`] capability, the type registry used by tagged storage, and
//! key helpers. Nothing in this crate performs backend I/O.

pub mod context;
pub mod error;
pub mod key;
pub mod logger;
pub mod options;
pub mod registry;

pub use context::{CancelHandle, Context};
pub use error::{
    CacheError, ConfigError, ConnectError, ContextError, DriverError, DriverResult, ForgetError,
    RegistrationError,
};
pub use key::{create_key, create_key_struct, hash, KeyPart};
pub use logger::{LogLevel, Logger, TracingLogger};
pub use options::{env_flag, env_parse, LogSink, Options};
pub use registry::TypeRegistry;
