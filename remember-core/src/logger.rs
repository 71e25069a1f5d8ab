//! Logging capability consumed by the orchestrator.
//!
//! The orchestrator reports through a caller-supplied [`Logger`] so that the
//! chattiness of cache bookkeeping stays a per-call decision. [`TracingLogger`]
//! is the stock implementation and forwards to `tracing`.

use std::fmt;

/// Severity of a log point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => f.write_str("debug"),
            LogLevel::Error => f.write_str("error"),
        }
    }
}

/// Receives formatted log messages.
///
/// Implementations must be cheap to call; the orchestrator may invoke them
/// several times per lookup.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, args: fmt::Arguments<'_>);
}

/// Forwards log points to `tracing` under the `remember` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "remember", "{}", args),
            LogLevel::Error => tracing::error!(target: "remember", "{}", args),
        }
    }
}

impl<L: Logger + ?Sized> Logger for std::sync::Arc<L> {
    fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        (**self).log(level, args)
    }
}
