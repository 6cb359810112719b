//! [`PoolClient`]: a self-healing pool of `capacity` connections.
//!
//! Grounded line-for-line in `original_source/pool.go`. Fixes applied
//! relative to the original (see `DESIGN.md`):
//! - initial fill closes every already-opened connection before propagating
//!   a construction error (Open Question 3), instead of leaking them;
//! - the repair loop has no `max_elapsed_time` cap, matching the original's
//!   unbounded `for { ... }` in `retryConnection` — only `PoolClient::close`
//!   stops it;
//! - initial fill dials under the connection retrier (spec.md §4.5.1: "Each
//!   call dials with the connection retrier"), matching `SimpleClient::new`;
//! - close-notify listeners select against a shutdown signal so they exit
//!   promptly on `Close()` instead of parking forever on a connection that
//!   closed cleanly (no error ever reaches `AmqpConnection::closed()` for a
//!   clean close, since `lapin`'s `on_error` only fires on error).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{watch, RwLock};

use super::Client;
use crate::amqp_conn::AmqpConnection;
use crate::channel::ChannelWrapper;
use crate::dialer::Dialer;
use crate::error::{Error, Result};
use crate::observer::Observer;
use crate::options::ClientConfig;
use crate::retry::{RetryPolicy, Retrier};

/// Lower/upper bounds of the repair loop's jittered redial delay
/// (`original_source/pool.go::retryConnection`: `200 + rand.Intn(801)` ms).
const REPAIR_RETRY_MIN: Duration = Duration::from_millis(200);
const REPAIR_RETRY_MAX: Duration = Duration::from_millis(1000);

struct Shared {
    dialer: Arc<dyn Dialer>,
    observer: Arc<dyn Observer>,
    connection_retry: RetryPolicy,
    channel_retry: RetryPolicy,
    connections: RwLock<Vec<Option<Arc<dyn AmqpConnection>>>>,
    closed: AtomicBool,
    /// Fired once, with `true`, by `close()` so parked close-notify
    /// listeners wake up and exit instead of leaking past shutdown.
    shutdown: watch::Sender<bool>,
}

/// A pool of `capacity` connections, each independently redialed in the
/// background when it closes. `Client::channel` dispatches to a live
/// connection chosen at a random starting offset (spec.md §4.5.2).
pub struct PoolClient {
    shared: Arc<Shared>,
}

impl PoolClient {
    pub(crate) async fn new(dialer: Arc<dyn Dialer>, config: ClientConfig) -> Result<Self> {
        let (shutdown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            dialer,
            observer: config.observer.clone(),
            connection_retry: config.connection_retry,
            channel_retry: config.channel_retry,
            connections: RwLock::new(Vec::with_capacity(config.capacity)),
            closed: AtomicBool::new(false),
            shutdown,
        });

        if let Err(err) = Self::fill(&shared, config.capacity).await {
            Self::close_all(&shared).await;
            return Err(err);
        }

        Ok(Self { shared })
    }

    /// Dials `capacity` connections, one per slot, each under the
    /// connection retrier (spec.md §4.5.1). On any failure, the caller
    /// closes every connection opened so far (Open Question 3 fix).
    async fn fill(shared: &Arc<Shared>, capacity: usize) -> Result<()> {
        let retrier = Retrier::new(shared.connection_retry);
        for idx in 0..capacity {
            let connection = retrier
                .retry(|| async { shared.dialer.dial(idx).await })
                .await
                .map_err(|e| e.wrap_connection())?;
            shared.connections.write().await.push(Some(connection.clone()));
            spawn_close_listener(shared.clone(), idx, connection);
        }
        Ok(())
    }

    async fn close_all(shared: &Arc<Shared>) {
        let slots = shared.connections.read().await;
        for slot in slots.iter().flatten() {
            if let Err(err) = slot.close().await {
                shared.observer.on_close(close_cause(&err));
            }
        }
    }
}

fn close_cause(err: &Error) -> Option<&lapin::Error> {
    match err {
        Error::Amqp(e) => Some(e),
        _ => None,
    }
}

/// Spawns the background task that waits for slot `idx`'s connection to
/// close, then hands off to the repair loop
/// (`original_source/pool.go::listenOnCloseConnection`). Races the
/// connection's own close-notify against the pool's shutdown signal so the
/// task cannot outlive `Close()`.
fn spawn_close_listener(shared: Arc<Shared>, idx: usize, connection: Arc<dyn AmqpConnection>) {
    tokio::spawn(async move {
        let mut shutdown = shared.shutdown.subscribe();
        let mut closed_rx = connection.closed();

        tokio::select! {
            cause = &mut closed_rx => {
                let cause = cause.unwrap_or(None);
                if let Some(err) = &cause {
                    shared.observer.on_close(Some(err));
                }

                shared.connections.write().await[idx] = None;
                repair_loop(shared, idx).await;
            }
            _ = shutdown.changed() => {
                // `close()` already closed this connection; nothing to repair.
            }
        }
    });
}

/// Redials slot `idx` forever, with a 200ms-1s jittered delay between
/// attempts, until it succeeds or the pool is closed
/// (`original_source/pool.go::retryConnection`).
async fn repair_loop(shared: Arc<Shared>, idx: usize) {
    loop {
        if shared.closed.load(Ordering::SeqCst) {
            return;
        }

        match shared.dialer.dial(idx).await {
            Ok(connection) => {
                shared.connections.write().await[idx] = Some(connection.clone());
                spawn_close_listener(shared.clone(), idx, connection);
                return;
            }
            Err(_) => {
                let jitter_span = (REPAIR_RETRY_MAX - REPAIR_RETRY_MIN).as_millis() as u64;
                let jitter = rand::rng().random_range(0..=jitter_span);
                tokio::time::sleep(REPAIR_RETRY_MIN + Duration::from_millis(jitter)).await;
            }
        }
    }
}

#[async_trait]
impl Client for PoolClient {
    async fn channel(&self) -> Result<ChannelWrapper> {
        // Snapshot only the slot count under the read lock (spec.md §5:
        // "snapshots take the read lock and must not be held across
        // blocking I/O"); the per-slot connection is cloned out and the
        // lock dropped again before the channel-open roundtrip below.
        let capacity = self.shared.connections.read().await.len();
        let offset = rand::rng().random_range(0..capacity);

        for i in 0..capacity {
            let idx = (i + offset) % capacity;

            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(Error::ClientClosed.wrap_channel());
            }

            let connection = self.shared.connections.read().await[idx].clone();

            if let Some(connection) = connection {
                match connection.open_channel().await {
                    Ok(channel) => {
                        return Ok(ChannelWrapper::new(
                            channel,
                            Retrier::new(self.shared.channel_retry),
                        ))
                    }
                    // On failure, advance to the next slot instead of
                    // giving up (spec.md §4.5.2).
                    Err(_) => continue,
                }
            }
        }

        Err(Error::NoConnectionAvailable.wrap_channel())
    }

    async fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Wake every parked close-notify listener before closing
        // connections, so none of them survive this call.
        let _ = self.shared.shutdown.send(true);
        PoolClient::close_all(&self.shared).await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp_conn::fake::FakeConnection;
    use crate::options::ClientConfig;
    use std::sync::atomic::AtomicUsize;

    struct CountingDialer {
        calls: AtomicUsize,
        fail: AtomicBool,
        created: std::sync::Mutex<Vec<Arc<FakeConnection>>>,
    }

    impl CountingDialer {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(fail),
                created: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Dialer for CountingDialer {
        async fn dial(&self, _id: usize) -> Result<Arc<dyn AmqpConnection>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::NoConnectionAvailable);
            }
            let fake = Arc::new(FakeConnection::new(n));
            self.created.lock().unwrap().push(fake.clone());
            Ok(fake)
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        fn heartbeat(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    #[tokio::test]
    async fn construction_fails_fast_when_dialer_always_errors() {
        let dialer = Arc::new(CountingDialer::new(true));
        let config = ClientConfig {
            capacity: 3,
            ..ClientConfig::default()
        };

        let err = PoolClient::new(dialer.clone(), config).await.unwrap_err();
        assert!(matches!(err, Error::CannotOpenConnection(_)));
        // Fails on the very first slot; no partial fill to leak.
        assert_eq!(dialer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn construction_fills_every_slot() {
        let dialer = Arc::new(CountingDialer::new(false));
        let config = ClientConfig {
            capacity: 3,
            ..ClientConfig::default()
        };

        let pool = PoolClient::new(dialer.clone(), config).await.unwrap();
        assert_eq!(dialer.calls.load(Ordering::SeqCst), 3);
        assert!(!pool.is_closed());
    }

    #[tokio::test]
    async fn closed_pool_rejects_channel_requests() {
        let dialer = Arc::new(CountingDialer::new(false));
        let config = ClientConfig {
            capacity: 2,
            ..ClientConfig::default()
        };

        let pool = PoolClient::new(dialer, config).await.unwrap();
        pool.close().await.unwrap();
        pool.close().await.unwrap();
        assert!(pool.is_closed());

        let err = pool.channel().await.unwrap_err();
        // `channel()` wraps `ClientClosed` via `wrap_channel`, landing in
        // `Error::CannotOpenChannel`; assert on the wrapped source.
        match err {
            Error::CannotOpenChannel(source) => assert!(matches!(*source, Error::ClientClosed)),
            other => panic!("expected CannotOpenChannel(ClientClosed), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fill_dials_under_the_connection_retrier() {
        let dialer = Arc::new(CountingDialer::new(true));
        let config = ClientConfig {
            capacity: 1,
            connection_retry: RetryPolicy::Exponential {
                initial_interval: Duration::from_millis(1),
                max_interval: Duration::from_millis(2),
                max_elapsed_time: Duration::from_millis(20),
            },
            ..ClientConfig::default()
        };

        let err = PoolClient::new(dialer.clone(), config).await.unwrap_err();
        // Several attempts happened under the retrier before giving up, and
        // the chain bottoms out in `RetryExceeded` rather than the bare
        // first-attempt dial error (spec.md §8 S4).
        assert!(dialer.calls.load(Ordering::SeqCst) > 1);
        match err {
            Error::CannotOpenConnection(source) => {
                assert!(matches!(*source, Error::RetryExceeded { .. }))
            }
            other => panic!("expected CannotOpenConnection(RetryExceeded), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_wakes_parked_close_notify_listeners() {
        let dialer = Arc::new(CountingDialer::new(false));
        let config = ClientConfig {
            capacity: 1,
            ..ClientConfig::default()
        };

        let pool = PoolClient::new(dialer.clone(), config).await.unwrap();
        let connection = dialer.created.lock().unwrap()[0].clone();

        pool.close().await.unwrap();
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        // Before the fix, the close-notify listener parks forever on a
        // clean-close connection that never fires its `closed()` oneshot,
        // holding its own `Arc` clone past `close()` returning. Once the
        // listener has exited, only the dialer's bookkeeping vector, the
        // pool's (still-populated, now-closed) slot, and this local
        // binding reference the connection.
        assert_eq!(Arc::strong_count(&connection), 3);
    }

    #[tokio::test]
    async fn a_dropped_connection_is_eventually_repaired() {
        let dialer = Arc::new(CountingDialer::new(false));
        let config = ClientConfig {
            capacity: 1,
            ..ClientConfig::default()
        };

        let pool = PoolClient::new(dialer.clone(), config).await.unwrap();
        assert_eq!(dialer.calls.load(Ordering::SeqCst), 1);

        let first_connection = dialer.created.lock().unwrap()[0].clone();
        assert_eq!(first_connection.id, 1);
        first_connection.simulate_close(None);

        // Give the close listener + repair loop a chance to run; the fake
        // dialer succeeds immediately so repair doesn't hit the jittered
        // sleep path at all.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(dialer.calls.load(Ordering::SeqCst) >= 2);
        assert!(!pool.is_closed());
    }
}
