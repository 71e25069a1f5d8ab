//! Per-call options for the cache-aside orchestrator.
//!
//! Options are a plain value: they apply to the invocation they are passed
//! to and nothing else. Environment loading is provided for services that
//! want to flip caching behaviour without a redeploy.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::logger::{LogLevel, Logger, TracingLogger};

/// Changes caching behaviour for a single call.
#[derive(Clone, Default)]
pub struct Options {
    /// Skip the cache entirely and always call the fallback.
    /// Useful while debugging.
    pub disable_cache_usage: bool,

    /// Ignore any cached entry, call the fallback, and store its result.
    pub use_fresh_data: bool,

    /// Receives debug and error messages when set.
    pub logger: Option<Arc<dyn Logger>>,

    /// Only forward error messages to the logger.
    /// Recommended for production.
    pub only_log_errors: bool,

    /// Register the fallback's result type with the type registry before
    /// writing it back. Drivers that store tagged values need the type to be
    /// registered; registering once at startup is cheaper.
    pub register_type: bool,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("disable_cache_usage", &self.disable_cache_usage)
            .field("use_fresh_data", &self.use_fresh_data)
            .field("logger", &self.logger.as_ref().map(|_| "<logger>"))
            .field("only_log_errors", &self.only_log_errors)
            .field("register_type", &self.register_type)
            .finish()
    }
}

impl Options {
    /// Create options with every behaviour switched off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the cache is bypassed.
    pub fn with_cache_disabled(mut self, disabled: bool) -> Self {
        self.disable_cache_usage = disabled;
        self
    }

    /// Set whether cached entries are ignored and refreshed.
    pub fn with_fresh_data(mut self, fresh: bool) -> Self {
        self.use_fresh_data = fresh;
        self
    }

    /// Set the logger that receives log points.
    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Log through `tracing`.
    pub fn with_tracing(self) -> Self {
        self.with_logger(TracingLogger)
    }

    /// Set whether only error messages reach the logger.
    pub fn with_only_errors(mut self, only_errors: bool) -> Self {
        self.only_log_errors = only_errors;
        self
    }

    /// Set whether result types are registered before write-back.
    pub fn with_type_registration(mut self, register: bool) -> Self {
        self.register_type = register;
        self
    }

    /// Load options from environment variables.
    ///
    /// Environment variables:
    /// - `REMEMBER_DISABLE_CACHE`: "true"/"1" to bypass the cache (default: false)
    /// - `REMEMBER_USE_FRESH_DATA`: "true"/"1" to always refresh (default: false)
    /// - `REMEMBER_ONLY_LOG_ERRORS`: "true"/"1" to drop debug messages (default: false)
    /// - `REMEMBER_REGISTER_TYPE`: "true"/"1" to register result types (default: false)
    ///
    /// No logger is configured; attach one with [`Options::with_logger`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            disable_cache_usage: env_flag("REMEMBER_DISABLE_CACHE")?,
            use_fresh_data: env_flag("REMEMBER_USE_FRESH_DATA")?,
            logger: None,
            only_log_errors: env_flag("REMEMBER_ONLY_LOG_ERRORS")?,
            register_type: env_flag("REMEMBER_REGISTER_TYPE")?,
        })
    }

    /// Borrowing view used at log points.
    pub fn log_sink(&self) -> LogSink<'_> {
        LogSink {
            logger: self.logger.as_deref(),
            only_errors: self.only_log_errors,
        }
    }
}

/// Applies the `only_log_errors` filter in front of an optional logger.
#[derive(Clone, Copy)]
pub struct LogSink<'a> {
    logger: Option<&'a dyn Logger>,
    only_errors: bool,
}

impl LogSink<'_> {
    /// Forward a debug message unless only errors are wanted.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        if self.only_errors {
            return;
        }
        if let Some(logger) = self.logger {
            logger.log(LogLevel::Debug, args);
        }
    }

    /// Forward an error message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.logger {
            logger.log(LogLevel::Error, args);
        }
    }
}

/// Parse a boolean flag from the environment. Unset means false.
pub fn env_flag(name: &str) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(value) => parse_flag(name, &value),
        Err(_) => Ok(false),
    }
}

/// Parse a value from the environment. Unset means `None`.
pub fn env_parse<N>(name: &str) -> Result<Option<N>, ConfigError>
where
    N: std::str::FromStr,
    N::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => parse_value(name, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<N>(field: &str, value: &str) -> Result<N, ConfigError>
where
    N: std::str::FromStr,
    N::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: N::Err| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
