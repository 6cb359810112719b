//! Single-broker dialer. Grounded in `original_source/dialer_simple.go`,
//! which sets `amqp.Config{Dial: dialer(e.timeout)}` so the socket dial and
//! initial handshake can't wedge past `timeout`; `tokio::time::timeout`
//! around `LapinConnection::connect` plays the same role here.

use std::sync::Arc;

use async_trait::async_trait;

use super::{build_config, uri_with_heartbeat, Dialer, DialerConfig, DialerOption};
use crate::amqp_conn::{AmqpConnection, LapinConnection};
use crate::error::{Error, Result};

/// Always dials the same broker URI, regardless of connection slot id.
pub struct SimpleDialer {
    uri: String,
    config: DialerConfig,
}

impl SimpleDialer {
    /// Builds a dialer for a single broker URI. Fails if `uri` is empty
    /// (`ErrBrokerURIRequired` in the original) or any option is invalid.
    pub fn new(uri: impl Into<String>, options: Vec<DialerOption>) -> Result<Self> {
        let uri = uri.into();
        if uri.is_empty() {
            return Err(Error::BrokerUriRequired);
        }
        let config = build_config(options)?;
        Ok(Self { uri, config })
    }
}

#[async_trait]
impl Dialer for SimpleDialer {
    async fn dial(&self, _id: usize) -> Result<Arc<dyn AmqpConnection>> {
        let uri = uri_with_heartbeat(&self.uri, self.config.heartbeat)?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_uri_is_rejected() {
        let err = SimpleDialer::new("", vec![]).unwrap_err();
        assert!(matches!(err, Error::BrokerUriRequired));
    }

    #[test]
    fn valid_uri_builds_dialer_with_default_config() {
        let dialer = SimpleDialer::new("amqp://localhost/", vec![]).unwrap();
        assert_eq!(dialer.timeout(), super::super::DEFAULT_TIMEOUT);
        assert_eq!(dialer.heartbeat(), super::super::DEFAULT_HEARTBEAT);
    }
}
