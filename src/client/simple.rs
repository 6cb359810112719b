//! [`SimpleClient`]: holds exactly one connection, no pool, no background
//! repair. Grounded in spec.md §4.4 (the distilled spec upgrades the
//! original `simple.go`, which re-dials on every `Channel()` call with no
//! held connection at all — the held-connection, re-dial-on-closed shape
//! below is spec.md's documented behaviour, not the original's).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Client;
use crate::amqp_conn::AmqpConnection;
use crate::channel::ChannelWrapper;
use crate::dialer::Dialer;
use crate::error::{Error, Result};
use crate::options::ClientConfig;
use crate::retry::Retrier;

/// Holds one connection for its entire lifetime, replacing it exactly once
/// per `Channel()` call if the channel-open fails with a closed-connection
/// sentinel. Unlike [`super::PoolClient`], a dropped connection is only
/// noticed synchronously on the next `channel()` call — there is no
/// background repair task.
pub struct SimpleClient {
    dialer: Arc<dyn Dialer>,
    config: ClientConfig,
    connection: RwLock<Arc<dyn AmqpConnection>>,
    closed: AtomicBool,
}

impl SimpleClient {
    /// Dials the held connection eagerly, under the connection retrier
    /// (spec.md §4.4: "Construction calls the connection retrier around
    /// `Dialer.dial(0)`").
    pub(crate) async fn new(dialer: Arc<dyn Dialer>, config: ClientConfig) -> Result<Self> {
        let retrier = Retrier::new(config.connection_retry);
        let connection = retrier
            .retry(|| async { dialer.dial(0).await })
            .await
            .map_err(|e| e.wrap_connection())?;

        Ok(Self {
            dialer,
            config,
            connection: RwLock::new(connection),
            closed: AtomicBool::new(false),
        })
    }

    async fn redial(&self) -> Result<Arc<dyn AmqpConnection>> {
        let retrier = Retrier::new(self.config.connection_retry);
        let connection = retrier
            .retry(|| async { self.dialer.dial(0).await })
            .await
            .map_err(|e| e.wrap_connection())?;
        *self.connection.write().await = connection.clone();
        Ok(connection)
    }
}

#[async_trait]
impl Client for SimpleClient {
    async fn channel(&self) -> Result<ChannelWrapper> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ClientClosed);
        }

        let connection = self.connection.read().await.clone();

        match connection.open_channel().await {
            Ok(channel) => Ok(ChannelWrapper::new(
                channel,
                Retrier::new(self.config.channel_retry),
            )),
            Err(err) if err.indicates_closed_connection() => {
                // Open Question 1: a channel-open failure whose cause is a
                // closed-connection sentinel triggers exactly one re-dial,
                // replacing the held connection, before trying once more.
                let connection = self.redial().await?;
                let channel = connection.open_channel().await.map_err(|e| e.wrap_channel())?;
                Ok(ChannelWrapper::new(channel, Retrier::new(self.config.channel_retry)))
            }
            Err(err) => Err(err.wrap_channel()),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let connection = self.connection.read().await.clone();
        if let Err(err) = connection.close().await {
            if let Error::Amqp(amqp_err) = &err {
                self.config.observer.on_close(Some(amqp_err));
            }
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp_conn::fake::FakeConnection;
    use crate::options::ClientConfig;
    use std::sync::atomic::AtomicUsize;

    struct FailingDialer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Dialer for FailingDialer {
        async fn dial(&self, _id: usize) -> Result<Arc<dyn AmqpConnection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::NoConnectionAvailable)
        }

        fn timeout(&self) -> std::time::Duration {
            std::time::Duration::from_secs(1)
        }

        fn heartbeat(&self) -> std::time::Duration {
            std::time::Duration::from_secs(1)
        }
    }

    #[tokio::test]
    async fn construction_fails_when_initial_dial_fails() {
        let dialer = Arc::new(FailingDialer {
            calls: AtomicUsize::new(0),
        });
        let err = SimpleClient::new(dialer.clone(), ClientConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CannotOpenConnection(_)));
        assert_eq!(dialer.calls.load(Ordering::SeqCst), 1);
    }

    struct OnceDialer {
        connection: std::sync::Mutex<Option<Arc<FakeConnection>>>,
    }

    #[async_trait]
    impl Dialer for OnceDialer {
        async fn dial(&self, _id: usize) -> Result<Arc<dyn AmqpConnection>> {
            let connection = self
                .connection
                .lock()
                .unwrap()
                .take()
                .expect("dial called more than once in this test");
            Ok(connection)
        }

        fn timeout(&self) -> std::time::Duration {
            std::time::Duration::from_secs(1)
        }

        fn heartbeat(&self) -> std::time::Duration {
            std::time::Duration::from_secs(1)
        }
    }

    #[tokio::test]
    async fn closed_client_rejects_channel_requests() {
        let connection = Arc::new(FakeConnection::new(0));
        let dialer = Arc::new(OnceDialer {
            connection: std::sync::Mutex::new(Some(connection)),
        });

        let client = SimpleClient::new(dialer, ClientConfig::default()).await.unwrap();
        client.close().await.unwrap();
        assert!(client.is_closed());

        let err = client.channel().await.unwrap_err();
        assert!(matches!(err, Error::ClientClosed));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let connection = Arc::new(FakeConnection::new(0));
        let dialer = Arc::new(OnceDialer {
            connection: std::sync::Mutex::new(Some(connection)),
        });

        let client = SimpleClient::new(dialer, ClientConfig::default()).await.unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(client.is_closed());
    }
}
