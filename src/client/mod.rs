//! The `Client` trait and the `simple`/`pool` factory dispatch.
//!
//! Grounded in `original_source/client.go::New`: build a `ClientConfig` from
//! the supplied options, then hand off to either `newSimple` or `newPool`
//! depending on `use_pool`.

mod pool;
mod simple;

pub use pool::PoolClient;
pub use simple::SimpleClient;

use async_trait::async_trait;
use std::sync::Arc;

use crate::channel::ChannelWrapper;
use crate::dialer::Dialer;
use crate::error::{Error, Result};
use crate::options::{build, ClientOption};

/// A resilient AMQP client front-end, backed by either a single connection
/// ([`SimpleClient`]) or a self-healing connection pool ([`PoolClient`]).
#[async_trait]
pub trait Client: Send + Sync {
    /// Opens a new channel from a live connection, or returns
    /// [`Error::ClientClosed`]/[`Error::NoConnectionAvailable`].
    async fn channel(&self) -> Result<ChannelWrapper>;

    /// Closes the client. Idempotent.
    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Builds a [`Client`] from a [`Dialer`] and a list of [`ClientOption`]s.
///
/// Pooling is enabled by default (capacity 10, see
/// `options::DEFAULT_CONNECTIONS_CAPACITY`); pass
/// [`crate::options::without_connections_pool`] to get a [`SimpleClient`]
/// instead.
pub async fn new(dialer: Arc<dyn Dialer>, options: Vec<ClientOption>) -> Result<Arc<dyn Client>> {
    let config = build(options)?;

    if !config.use_pool {
        config.logger.debug("Connection pooling is disabled");
        let client = SimpleClient::new(dialer, config)
            .await
            .map_err(|e| Error::CannotCreateClient(Box::new(e)))?;
        return Ok(Arc::new(client));
    }

    config
        .logger
        .debug(&format!("Connection pooling is enabled ({} connections)", config.capacity));

    let client = PoolClient::new(dialer, config)
        .await
        .map_err(|e| Error::CannotCreateClient(Box::new(e)))?;
    Ok(Arc::new(client))
}
