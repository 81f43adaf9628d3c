use crate::amqp::Delivery;
use futures_util::stream::{BoxStream, StreamExt};
use lapin::{
    options::{
        BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, ExchangeKind,
};
use tracing::warn;

/// AMQP `reply-success`.
const REPLY_SUCCESS: u16 = 200;

/// The messages pushed by the broker to a consumer, in delivery order.
///
/// The stream ends when the consumer is cancelled or the channel/connection goes away.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, anyhow::Error>>;

/// `Transport` is a connection to a broker that can open channels.
///
/// It is implemented for [`lapin::Connection`]; the topology manager, publishers and
/// consumers are generic over it so that they can run against any broker client.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    type Channel: TransportChannel;

    /// Open a new channel, multiplexed over this connection.
    async fn open_channel(&self) -> Result<Self::Channel, anyhow::Error>;
}

/// The operations we need from a channel, as a broker-agnostic interface.
///
/// Declarations are idempotent: declaring an existing queue or exchange with the same
/// properties, or an existing binding, is a no-op.
#[async_trait::async_trait]
pub trait TransportChannel: Send + Sync + 'static {
    /// Declare a durable queue.
    async fn declare_queue(&self, queue: &str) -> Result<(), anyhow::Error>;

    /// Declare a durable exchange of the given kind.
    async fn declare_exchange(&self, exchange: &str, kind: ExchangeKind)
        -> Result<(), anyhow::Error>;

    /// Route messages published on `exchange` with `routing_key` to `queue`.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), anyhow::Error>;

    /// Send a message, without waiting for a publisher confirmation.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<(), anyhow::Error>;

    /// Register an auto-acknowledging consumer on `queue`.
    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, anyhow::Error>;

    /// Ask the broker to stop delivering to the consumer registered as `consumer_tag`.
    async fn cancel(&self, consumer_tag: &str) -> Result<(), anyhow::Error>;

    /// Close the channel.
    async fn close(&self) -> Result<(), anyhow::Error>;
}

/// Close `channel` once `operation` is done with it.
///
/// The operation has already completed (or failed) at this point, so a failure to close is
/// only logged.
pub(crate) async fn close_channel<C: TransportChannel>(channel: &C, operation: &'static str) {
    if let Err(e) = channel.close().await {
        warn!(operation, "Failed to close the RabbitMq channel: {:?}", e);
    }
}

#[async_trait::async_trait]
impl Transport for lapin::Connection {
    type Channel = lapin::Channel;

    #[tracing::instrument(name = "rabbitmq_create_channel", skip(self), level = "debug")]
    async fn open_channel(&self) -> Result<lapin::Channel, anyhow::Error> {
        Ok(self.create_channel().await?)
    }
}

#[async_trait::async_trait]
impl TransportChannel for lapin::Channel {
    async fn declare_queue(&self, queue: &str) -> Result<(), anyhow::Error> {
        self.queue_declare(
            queue,
            QueueDeclareOptions {
                passive: false,
                durable: true,
                exclusive: false,
                auto_delete: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }

    async fn declare_exchange(
        &self,
        exchange: &str,
        kind: ExchangeKind,
    ) -> Result<(), anyhow::Error> {
        self.exchange_declare(
            exchange,
            kind,
            ExchangeDeclareOptions {
                passive: false,
                durable: true,
                auto_delete: false,
                internal: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), anyhow::Error> {
        self.queue_bind(
            queue,
            exchange,
            routing_key,
            QueueBindOptions { nowait: false },
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<(), anyhow::Error> {
        // Publisher confirms are not enabled on this channel: the returned confirmation
        // would resolve to `NotRequested`, so there is nothing to wait for.
        let _confirm = self
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, anyhow::Error> {
        let consumer = self
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(consumer
            .map(|delivery| delivery.map(Delivery::from).map_err(anyhow::Error::from))
            .boxed())
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), anyhow::Error> {
        self.basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), anyhow::Error> {
        // Channels die with their connection: nothing left to close.
        if !self.status().connected() {
            return Ok(());
        }
        lapin::Channel::close(self, REPLY_SUCCESS, "Operation completed").await?;
        Ok(())
    }
}
