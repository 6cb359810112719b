//! Human-facing logging, separate from [`crate::observer::Observer`]'s
//! operational side channel (spec.md §4.6 — "keep the two concerns
//! separate").

/// Logging severity, matching the original's five `LoggerLevel` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// A sink for human-readable operational messages.
///
/// The default implementation is a no-op (spec.md §4.6); install
/// [`TracingLogger`] via `Options::with_default_logger` to forward into the
/// `tracing` ecosystem instead.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn fatal(&self, message: &str) {
        self.log(Level::Fatal, message);
    }
}

/// Discards every message. Crate default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Forwards to the `tracing` macros at or above a minimum level.
///
/// `tracing` has no `fatal!` macro; [`Level::Fatal`] is emitted via `error!`
/// with a `fatal = true` field so it's still distinguishable downstream.
#[derive(Debug, Clone, Copy)]
pub struct TracingLogger {
    min_level: Level,
}

impl TracingLogger {
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        if level < self.min_level {
            return;
        }

        match level {
            Level::Debug => tracing::debug!("{}", message),
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
            Level::Fatal => tracing::error!(fatal = true, "{}", message),
        }
    }
}
