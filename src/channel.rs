//! [`ChannelWrapper`]: a `lapin::Channel` facade that retries `Publish` and
//! passes every other AMQP 0.9.1 operation straight through.
//!
//! Method list and grouping taken verbatim from `original_source/channel.go`
//! and `channel_retry.go`. Both original files implement `ExchangeBind` by
//! calling the underlying channel's `ExchangeUnbind` — a copy-paste bug
//! (Open Question 2, see `DESIGN.md`) fixed here: [`ChannelWrapper::exchange_bind`]
//! calls `exchange_bind`.
//!
//! spec.md §4.3 also lists `Flow` among the pass-through operations; `lapin`
//! has no `Channel::flow` — the AMQP 0.9.1 `channel.flow` method is a legacy
//! flow-control mechanism most brokers (including RabbitMQ) never honour, so
//! the library this crate fronts doesn't expose it. Omitted here for the
//! same reason; every other operation spec.md names has a direct `lapin`
//! counterpart below, including the `Notify*` event wiring
//! ([`ChannelWrapper::notify_close`]), which `amqp_conn::LapinConnection`
//! already implements the same way for connections: `lapin` has no Go-style
//! buffered `NotifyClose(chan *Error)`, so the wrapper exposes `lapin`'s own
//! `on_error` callback instead.

use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicGetOptions, BasicNackOptions,
    BasicPublishOptions, BasicQosOptions, BasicRecoverOptions, BasicRejectOptions,
    ConfirmSelectOptions, ExchangeBindOptions, ExchangeDeclareOptions, ExchangeDeleteOptions,
    ExchangeUnbindOptions, QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions,
    QueuePurgeOptions, QueueUnbindOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel as LapinChannel, Consumer, ExchangeKind};

use crate::error::Result;
use crate::retry::Retrier;

/// Wraps a `lapin::Channel`, retrying only `publish` under the configured
/// channel [`Retrier`] (spec.md §4.3): every other operation is a single
/// pass-through, since publish is the one operation whose failure on a
/// still-healthy channel is ordinarily safe to retry blind.
pub struct ChannelWrapper {
    channel: LapinChannel,
    retrier: Retrier,
}

impl ChannelWrapper {
    pub(crate) fn new(channel: LapinChannel, retrier: Retrier) -> Self {
        Self { channel, retrier }
    }

    /// Closes the underlying channel. Idempotent at the `lapin` level.
    pub async fn close(&self) -> Result<()> {
        self.channel
            .close(
                lapin::protocol::constants::REPLY_SUCCESS as u16,
                "closed by client",
            )
            .await
            .map_err(|e| crate::error::Error::from(e).wrap_channel())?;
        Ok(())
    }

    pub async fn qos(&self, prefetch_count: u16, options: BasicQosOptions) -> Result<()> {
        Ok(self.channel.basic_qos(prefetch_count, options).await?)
    }

    pub async fn cancel(&self, consumer_tag: &str, options: BasicCancelOptions) -> Result<()> {
        Ok(self.channel.basic_cancel(consumer_tag, options).await?)
    }

    pub async fn queue_declare(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        args: FieldTable,
    ) -> Result<lapin::Queue> {
        Ok(self.channel.queue_declare(name, options, args).await?)
    }

    pub async fn queue_declare_passive(
        &self,
        name: &str,
        args: FieldTable,
    ) -> Result<lapin::Queue> {
        let mut options = QueueDeclareOptions::default();
        options.passive = true;
        Ok(self.channel.queue_declare(name, options, args).await?)
    }

    pub async fn queue_bind(
        &self,
        name: &str,
        exchange: &str,
        routing_key: &str,
        options: QueueBindOptions,
        args: FieldTable,
    ) -> Result<()> {
        Ok(self
            .channel
            .queue_bind(name, exchange, routing_key, options, args)
            .await?)
    }

    pub async fn queue_unbind(
        &self,
        name: &str,
        exchange: &str,
        routing_key: &str,
        args: FieldTable,
    ) -> Result<()> {
        Ok(self
            .channel
            .queue_unbind(name, exchange, routing_key, args)
            .await?)
    }

    pub async fn queue_purge(&self, name: &str, options: QueuePurgeOptions) -> Result<u32> {
        Ok(self.channel.queue_purge(name, options).await?)
    }

    pub async fn queue_delete(&self, name: &str, options: QueueDeleteOptions) -> Result<u32> {
        Ok(self.channel.queue_delete(name, options).await?)
    }

    pub async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        options: BasicConsumeOptions,
        args: FieldTable,
    ) -> Result<Consumer> {
        Ok(self
            .channel
            .basic_consume(queue, consumer_tag, options, args)
            .await?)
    }

    pub async fn exchange_declare(
        &self,
        name: &str,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
        args: FieldTable,
    ) -> Result<()> {
        Ok(self
            .channel
            .exchange_declare(name, kind, options, args)
            .await?)
    }

    pub async fn exchange_declare_passive(
        &self,
        name: &str,
        kind: ExchangeKind,
        args: FieldTable,
    ) -> Result<()> {
        let mut options = ExchangeDeclareOptions::default();
        options.passive = true;
        Ok(self
            .channel
            .exchange_declare(name, kind, options, args)
            .await?)
    }

    pub async fn exchange_delete(&self, name: &str, options: ExchangeDeleteOptions) -> Result<()> {
        Ok(self.channel.exchange_delete(name, options).await?)
    }

    /// Binds `destination` to `source`. Fixed from the original's
    /// `ExchangeBind`/`ExchangeUnbind` copy-paste bug (see module docs).
    pub async fn exchange_bind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        options: ExchangeBindOptions,
        args: FieldTable,
    ) -> Result<()> {
        Ok(self
            .channel
            .exchange_bind(destination, source, routing_key, options, args)
            .await?)
    }

    pub async fn exchange_unbind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        options: ExchangeUnbindOptions,
        args: FieldTable,
    ) -> Result<()> {
        Ok(self
            .channel
            .exchange_unbind(destination, source, routing_key, options, args)
            .await?)
    }

    /// Publishes a message, retried under the channel [`Retrier`]
    /// (`original_source/channel.go::Publish` wraps the same call in
    /// `ch.retrier.retry(handler)`).
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        options: BasicPublishOptions,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<()> {
        self.retrier
            .retry(|| async {
                self.channel
                    .basic_publish(exchange, routing_key, options, payload, properties.clone())
                    .await?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, queue: &str, options: BasicGetOptions) -> Result<Option<lapin::message::BasicGetMessage>> {
        Ok(self.channel.basic_get(queue, options).await?)
    }

    pub async fn tx_select(&self) -> Result<()> {
        Ok(self.channel.tx_select().await?)
    }

    pub async fn tx_commit(&self) -> Result<()> {
        Ok(self.channel.tx_commit().await?)
    }

    pub async fn tx_rollback(&self) -> Result<()> {
        Ok(self.channel.tx_rollback().await?)
    }

    pub async fn confirm_select(&self, options: ConfirmSelectOptions) -> Result<()> {
        Ok(self.channel.confirm_select(options).await?)
    }

    pub async fn recover(&self, options: BasicRecoverOptions) -> Result<()> {
        Ok(self.channel.basic_recover(options).await?)
    }

    pub async fn ack(&self, delivery_tag: u64, options: BasicAckOptions) -> Result<()> {
        Ok(self.channel.basic_ack(delivery_tag, options).await?)
    }

    pub async fn nack(&self, delivery_tag: u64, options: BasicNackOptions) -> Result<()> {
        Ok(self.channel.basic_nack(delivery_tag, options).await?)
    }

    pub async fn reject(&self, delivery_tag: u64, options: BasicRejectOptions) -> Result<()> {
        Ok(self.channel.basic_reject(delivery_tag, options).await?)
    }

    pub fn id(&self) -> u16 {
        self.channel.id()
    }

    /// Registers `handler` to run if the underlying connection reports an
    /// error that closes this channel (spec.md §4.3's `Notify*` event
    /// wiring). The `lapin` analogue of `amqp_conn::LapinConnection`'s own
    /// `on_error` callback — `lapin` has no separate buffered close-notify
    /// channel the way the original's `NotifyClose(chan *Error)` does.
    pub fn notify_close<F>(&self, handler: F)
    where
        F: Fn(lapin::Error) + Send + 'static,
    {
        self.channel.on_error(handler);
    }
}
