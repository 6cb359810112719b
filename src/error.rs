//! Sentinel errors and wrapping chains.
//!
//! Every sentinel named in the original `ulule/amqpx` `errors.go` is a unit
//! variant here so callers can match with `matches!(err, Error::ClientClosed)`
//! or walk `std::error::Error::source()`; the wrapping variants carry the
//! four error kinds described by the crate's error handling design
//! (configuration, terminal-state, transient I/O, shutdown).

use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every error this crate can return.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operating on a client that has already been closed. Permanent for
    /// the lifetime of the client.
    #[error("client is closed")]
    ClientClosed,

    /// A dialer was constructed with no broker URI.
    #[error("broker URI is required")]
    BrokerUriRequired,

    /// `WithObserver` was called with a value that can't be used.
    #[error("an observer instance is required")]
    ObserverRequired,

    /// `WithLogger` was called with a value that can't be used.
    #[error("a logger instance is required")]
    LoggerRequired,

    /// `Capacity` was called with a non-positive value.
    #[error("invalid connections pool capacity: {0}")]
    InvalidConnectionsPoolCapacity(i64),

    /// A retry duration option received a non-positive duration.
    #[error("invalid retry duration")]
    InvalidRetryDuration,

    /// `WithDialerTimeout` received a non-positive duration.
    #[error("invalid dialer timeout")]
    InvalidDialerTimeout,

    /// `WithDialerHeartbeat` received a non-positive duration.
    #[error("invalid dialer heartbeat")]
    InvalidDialerHeartbeat,

    /// A dial attempt exceeded the dialer's configured `timeout` before the
    /// connection handshake completed (spec.md §4.2: bounds the initial
    /// connect so a silent/half-dead broker can't wedge startup).
    #[error("dial timed out")]
    DialTimeout,

    /// The pool has no live connection to serve a channel from.
    #[error("no connection available")]
    NoConnectionAvailable,

    /// A retrier exhausted its `max_elapsed_time` budget.
    #[error("retry budget of {elapsed:?} exceeded after {attempts} attempt(s)")]
    RetryExceeded {
        elapsed: Duration,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Construction-time configuration error.
    #[error("cannot create client")]
    CannotCreateClient(#[source] Box<Error>),

    /// Dialer construction-time configuration error.
    #[error("cannot create dialer")]
    CannotCreateDialer(#[source] Box<Error>),

    /// Dialing a fresh connection failed.
    #[error("cannot open a new connection")]
    CannotOpenConnection(#[source] Box<Error>),

    /// Opening a channel on a live connection failed.
    #[error("cannot open a new channel")]
    CannotOpenChannel(#[source] Box<Error>),

    /// Closing the underlying channel failed.
    #[error("cannot close channel")]
    CannotCloseChannel(#[source] Box<Error>),

    /// An underlying `lapin` operation failed and was not itself retried
    /// or wrapped by one of the variants above.
    #[error(transparent)]
    Amqp(#[from] lapin::Error),
}

impl Error {
    /// True if the underlying `lapin` error indicates the connection or
    /// channel it came from is already closed.
    ///
    /// Used by `SimpleClient::channel` to decide whether a channel-open
    /// failure should trigger exactly one re-dial (see Open Question 1 in
    /// `SPEC_FULL.md` §4).
    pub(crate) fn indicates_closed_connection(&self) -> bool {
        match self {
            Error::Amqp(lapin::Error::InvalidConnectionState(_)) => true,
            Error::Amqp(lapin::Error::InvalidChannelState(_)) => true,
            Error::CannotOpenChannel(source) => source.indicates_closed_connection(),
            _ => false,
        }
    }

    pub(crate) fn wrap_connection(self) -> Error {
        Error::CannotOpenConnection(Box::new(self))
    }

    pub(crate) fn wrap_channel(self) -> Error {
        Error::CannotOpenChannel(Box::new(self))
    }
}
