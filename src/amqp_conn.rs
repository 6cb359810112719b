//! Internal seams over `lapin::Connection`/`lapin::Channel`.
//!
//! `spec.md` §6 describes the external `Connection`/`Channel` collaborator
//! as a Go-style structural interface; Rust has no structural typing, so
//! these thin traits play that role here, letting pool/dispatch logic in
//! `client::pool` and `client::simple` run against a fake implementation in
//! tests without opening a socket — the same reason `angzarr`'s
//! `bus/amqp/mod.rs` keeps its `Pool`/`Manager` usage behind `deadpool_lapin`
//! abstractions rather than calling `lapin::Connection` directly inline.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::Result;

/// A live AMQP connection capable of opening channels and reporting its own
/// closure exactly once.
#[async_trait]
pub trait AmqpConnection: Send + Sync {
    async fn open_channel(&self) -> Result<lapin::Channel>;

    /// Fires with the error that closed the connection, or `None` if it was
    /// closed cleanly. Consumes the notifier: a connection only closes once.
    fn closed(&self) -> oneshot::Receiver<Option<lapin::Error>>;

    async fn close(&self) -> Result<()>;
}

/// Adapts a real `lapin::Connection` to [`AmqpConnection`].
///
/// `lapin` has no Go-style `NotifyClose` channel; `on_error` is the
/// callback-based equivalent (spec.md §5), so this wrapper installs one at
/// construction time and forwards its single firing into a `oneshot`.
pub struct LapinConnection {
    inner: lapin::Connection,
    closed_rx: std::sync::Mutex<Option<oneshot::Receiver<Option<lapin::Error>>>>,
}

impl LapinConnection {
    pub async fn connect(uri: &str, options: lapin::ConnectionProperties) -> Result<Self> {
        let inner = lapin::Connection::connect(uri, options).await?;
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        inner.on_error(move |err| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(Some(err));
            }
        });
        Ok(Self {
            inner,
            closed_rx: std::sync::Mutex::new(Some(rx)),
        })
    }
}

#[async_trait]
impl AmqpConnection for LapinConnection {
    async fn open_channel(&self) -> Result<lapin::Channel> {
        Ok(self.inner.create_channel().await?)
    }

    fn closed(&self) -> oneshot::Receiver<Option<lapin::Error>> {
        self.closed_rx
            .lock()
            .unwrap()
            .take()
            .expect("closed() called more than once on the same connection")
    }

    async fn close(&self) -> Result<()> {
        self.inner
            .close(lapin::protocol::constants::REPLY_SUCCESS as u16, "closed by client")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! A connection test double, grounded on `bus/amqp/mod.rs`'s own
    //! in-module `CountingHandler` fake used to exercise reconnect logic
    //! without a broker.

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub struct FakeConnection {
        pub id: usize,
        pub channels_opened: AtomicUsize,
        pub fail_open_channel: AtomicBool,
        closed_tx: std::sync::Mutex<Option<oneshot::Sender<Option<lapin::Error>>>>,
        closed_rx: std::sync::Mutex<Option<oneshot::Receiver<Option<lapin::Error>>>>,
    }

    impl FakeConnection {
        pub fn new(id: usize) -> Self {
            let (tx, rx) = oneshot::channel();
            Self {
                id,
                channels_opened: AtomicUsize::new(0),
                fail_open_channel: AtomicBool::new(false),
                closed_tx: std::sync::Mutex::new(Some(tx)),
                closed_rx: std::sync::Mutex::new(Some(rx)),
            }
        }

        /// Simulates the broker (or network) dropping this connection.
        pub fn simulate_close(&self, cause: Option<lapin::Error>) {
            if let Some(tx) = self.closed_tx.lock().unwrap().take() {
                let _ = tx.send(cause);
            }
        }
    }

    #[async_trait]
    impl AmqpConnection for FakeConnection {
        async fn open_channel(&self) -> Result<lapin::Channel> {
            self.channels_opened.fetch_add(1, Ordering::Relaxed);
            if self.fail_open_channel.load(Ordering::Relaxed) {
                return Err(crate::error::Error::NoConnectionAvailable);
            }
            unreachable!(
                "FakeConnection cannot construct a real lapin::Channel; \
                 tests against this double must only assert on channels_opened/failure paths"
            );
        }

        fn closed(&self) -> oneshot::Receiver<Option<lapin::Error>> {
            self.closed_rx
                .lock()
                .unwrap()
                .take()
                .expect("closed() called more than once on the same fake connection")
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn simulated_close_fires_closed_receiver() {
        let conn = FakeConnection::new(1);
        let rx = conn.closed();
        conn.simulate_close(None);
        let cause = rx.await.unwrap();
        assert!(cause.is_none());
    }
}
