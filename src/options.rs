//! Functional-option client configuration.
//!
//! Grounded in `original_source/options.go`, `defaults.go`, and spec.md
//! §4.7's option table. `WithRetry()` from `options.go` is folded away (see
//! `DESIGN.md` resolution 5): supplying `with_exponential_*_retry` durations
//! both configures and enables the strategy in one call.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::logger::{Level, Logger, NoopLogger};
use crate::observer::{NoopObserver, Observer};
use crate::retry::RetryPolicy;

pub(crate) const DEFAULT_CONNECTIONS_CAPACITY: usize = 10;
pub(crate) const DEFAULT_RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(100);
pub(crate) const DEFAULT_RETRY_MAX_INTERVAL: Duration = Duration::from_secs(32);
pub(crate) const DEFAULT_RETRY_MAX_ELAPSED_TIME: Duration = Duration::from_secs(7 * 60);

pub(crate) struct ClientConfig {
    pub observer: Arc<dyn Observer>,
    pub logger: Arc<dyn Logger>,
    pub use_pool: bool,
    pub capacity: usize,
    pub connection_retry: RetryPolicy,
    pub channel_retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            observer: Arc::new(NoopObserver),
            logger: Arc::new(NoopLogger),
            use_pool: true,
            capacity: DEFAULT_CONNECTIONS_CAPACITY,
            connection_retry: RetryPolicy::Noop,
            channel_retry: RetryPolicy::Noop,
        }
    }
}

/// A single functional option in `New`'s `options: Vec<ClientOption>`.
pub struct ClientOption(Box<dyn FnOnce(&mut ClientConfig) -> Result<()>>);

impl ClientOption {
    fn apply(self, config: &mut ClientConfig) -> Result<()> {
        (self.0)(config)
    }
}

/// Configures a connections pool of `capacity` connections (must be > 0).
pub fn with_capacity(capacity: usize) -> ClientOption {
    ClientOption(Box::new(move |c| {
        if capacity == 0 {
            return Err(Error::InvalidConnectionsPoolCapacity(0));
        }
        c.use_pool = true;
        c.capacity = capacity;
        Ok(())
    }))
}

/// Disables pooling: every `Client::channel` call dials a fresh connection.
pub fn without_connections_pool() -> ClientOption {
    ClientOption(Box::new(|c| {
        c.use_pool = false;
        Ok(())
    }))
}

/// Installs an [`Observer`] to receive lifecycle events.
pub fn with_observer(observer: Arc<dyn Observer>) -> ClientOption {
    ClientOption(Box::new(move |c| {
        c.observer = observer;
        Ok(())
    }))
}

/// Installs a [`Logger`].
pub fn with_logger(logger: Arc<dyn Logger>) -> ClientOption {
    ClientOption(Box::new(move |c| {
        c.logger = logger;
        Ok(())
    }))
}

/// Installs the default `tracing`-backed logger, emitting at or above
/// `min_level` (spec.md §4.7: `WithDefaultLogger(level)`).
pub fn with_default_logger(min_level: Level) -> ClientOption {
    with_logger(Arc::new(crate::logger::TracingLogger::new(min_level)))
}

/// Enables exponential backoff retry for connection dialing, used while
/// opening new connections (both the initial pool fill and the background
/// repair loop's redials go through this policy). All three durations must
/// be positive.
pub fn with_exponential_connection_retry(
    initial_interval: Duration,
    max_interval: Duration,
    max_elapsed_time: Duration,
) -> ClientOption {
    ClientOption(Box::new(move |c| {
        if initial_interval.is_zero() || max_interval.is_zero() || max_elapsed_time.is_zero() {
            return Err(Error::InvalidRetryDuration);
        }
        c.connection_retry = RetryPolicy::Exponential {
            initial_interval,
            max_interval,
            max_elapsed_time,
        };
        Ok(())
    }))
}

/// Enables exponential backoff retry for `ChannelWrapper::publish`. All
/// three durations must be positive.
pub fn with_exponential_channel_retry(
    initial_interval: Duration,
    max_interval: Duration,
    max_elapsed_time: Duration,
) -> ClientOption {
    ClientOption(Box::new(move |c| {
        if initial_interval.is_zero() || max_interval.is_zero() || max_elapsed_time.is_zero() {
            return Err(Error::InvalidRetryDuration);
        }
        c.channel_retry = RetryPolicy::Exponential {
            initial_interval,
            max_interval,
            max_elapsed_time,
        };
        Ok(())
    }))
}

pub(crate) fn build(options: Vec<ClientOption>) -> Result<ClientConfig> {
    let mut config = ClientConfig::default();
    for option in options {
        option.apply(&mut config).map_err(|e| Error::CannotCreateClient(Box::new(e)))?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_constants() {
        let config = ClientConfig::default();
        assert!(config.use_pool);
        assert_eq!(config.capacity, 10);
        assert!(matches!(config.connection_retry, RetryPolicy::Noop));
        assert!(matches!(config.channel_retry, RetryPolicy::Noop));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = build(vec![with_capacity(0)]).unwrap_err();
        assert!(matches!(
            err,
            Error::CannotCreateClient(source) if matches!(*source, Error::InvalidConnectionsPoolCapacity(0))
        ));
    }

    #[test]
    fn without_pool_disables_pooling() {
        let config = build(vec![without_connections_pool()]).unwrap();
        assert!(!config.use_pool);
    }

    #[test]
    fn zero_retry_duration_is_rejected() {
        let err = build(vec![with_exponential_connection_retry(
            Duration::ZERO,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )])
        .unwrap_err();
        assert!(matches!(
            err,
            Error::CannotCreateClient(source) if matches!(*source, Error::InvalidRetryDuration)
        ));
    }

    #[test]
    fn default_logger_is_installed_at_requested_level() {
        let config = build(vec![with_default_logger(Level::Warn)]).unwrap();
        config.logger.info("suppressed below Warn");
        config.logger.warn("visible at Warn");
    }

    #[test]
    fn exponential_retry_option_is_applied() {
        let config = build(vec![with_exponential_channel_retry(
            DEFAULT_RETRY_INITIAL_INTERVAL,
            DEFAULT_RETRY_MAX_INTERVAL,
            DEFAULT_RETRY_MAX_ELAPSED_TIME,
        )])
        .unwrap();
        assert!(matches!(
            config.channel_retry,
            RetryPolicy::Exponential { .. }
        ));
    }
}
