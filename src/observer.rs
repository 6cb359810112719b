//! Operational event sink, distinct from [`crate::logger::Logger`].
//!
//! The original's `observer.go` exists so a host application can feed pool
//! lifecycle events into its own metrics/alerting without this crate taking
//! an opinion on *how* they're reported; `Logger` is strictly for human-
//! readable text.

/// Notified of connection/channel lifecycle events a host may want to meter.
pub trait Observer: Send + Sync {
    /// A connection or channel operation returned an error that the crate
    /// itself isn't surfacing to the caller (e.g. a background repair
    /// attempt that failed and will retry).
    fn on_error(&self, err: &lapin::Error) {
        let _ = err;
    }

    /// A connection was closed, whether cleanly or due to an error. `cause`
    /// is `None` for a clean close requested by `Client::close`.
    fn on_close(&self, cause: Option<&lapin::Error>) {
        let _ = cause;
    }
}

/// Observes nothing. Crate default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}
