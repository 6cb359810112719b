//! Multi-broker dialer. Grounded in `original_source/dialer_cluster.go`.
//! Applies the same dial-timeout bound as [`super::SimpleDialer`]
//! (`original_source/dialer_simple.go`'s `amqp.Config{Dial: dialer(e.timeout)}`)
//! via `tokio::time::timeout` around `LapinConnection::connect`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{build_config, uri_with_heartbeat, Dialer, DialerConfig, DialerOption};
use crate::amqp_conn::{AmqpConnection, LapinConnection};
use crate::error::{Error, Result};

/// Round-robins across a fixed list of broker URIs by connection slot id.
///
/// Selection is `id % uris.len()` (`original_source/dialer_cluster.go`):
/// deterministic per slot, not random, so a given pool slot always prefers
/// the same broker across repair-loop redials.
pub struct ClusterDialer {
    uris: Vec<String>,
    config: DialerConfig,
}

impl ClusterDialer {
    /// Builds a dialer over `uris`. Fails if the list is empty or any option
    /// is invalid.
    pub fn new(uris: Vec<String>, options: Vec<DialerOption>) -> Result<Self> {
        if uris.is_empty() {
            return Err(Error::BrokerUriRequired);
        }
        let config = build_config(options)?;
        Ok(Self { uris, config })
    }

    fn uri_for(&self, id: usize) -> &str {
        &self.uris[id % self.uris.len()]
    }
}

#[async_trait]
impl Dialer for ClusterDialer {
    async fn dial(&self, id: usize) -> Result<Arc<dyn AmqpConnection>> {
        let uri = uri_with_heartbeat(self.uri_for(id), self.config.heartbeat)?;
        let connection = tokio::time::timeout(
            self.config.timeout,
            LapinConnection::connect(&uri, lapin::ConnectionProperties::default()),
        )
        .await
        .map_err(|_| Error::DialTimeout.wrap_connection())?
        .map_err(|e| e.wrap_connection())?;
        Ok(Arc::new(connection))
    }

    fn timeout(&self) -> std::time::Duration {
        self.config.timeout
    }

    fn heartbeat(&self) -> std::time::Duration {
        self.config.heartbeat
    }
}
