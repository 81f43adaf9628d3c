use crate::amqp::transport::{close_channel, Transport, TransportChannel};
use crate::amqp::{BasicProperties, ConnectionFactory};
use crate::pool::{ConnectionPool, Manager, PoolError};
use crate::publishers::message_envelope::{MessageEnvelope, DEFAULT_CONTENT_TYPE};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use uuid::Uuid;

/// Delivery mode: Non-persistent (1) or persistent (2).
const NON_PERSISTENT: u8 = 1;

/// Publishes messages through a [`ConnectionPool`].
///
/// Every call checks a connection out, opens a channel, sends the message, closes the
/// channel and returns the connection: `Publisher` holds no broker resource between calls.
///
/// # Delivery guarantees
///
/// Messages are fire-and-forget: publisher confirms are not requested and the broker may
/// drop messages that cannot be routed. Failures are returned to the caller as they are,
/// `Publisher` never retries.
///
/// # Example
///
/// ```rust
/// use carrot_pool::pool::ConnectionPool;
/// use carrot_pool::publishers::Publisher;
///
/// async fn notify(pool: ConnectionPool) -> anyhow::Result<()> {
///     let publisher = Publisher::new(pool);
///     publisher
///         .publish_bytes("user", "public", br#"{"behavior":1}"#)
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Publisher<M: Manager = ConnectionFactory> {
    pool: ConnectionPool<M>,
}

impl<M: Manager> Clone for Publisher<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// Error returned when trying to publish a message using `Publisher`.
#[derive(thiserror::Error, Debug)]
pub enum PublisherError {
    /// No connection could be checked out. The pool error is passed through untouched.
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("Failed to open a channel to publish the message")]
    Channel(#[source] anyhow::Error),
    #[error("Failed to publish the message to exchange `{exchange}` with routing key `{routing_key}`")]
    Publish {
        exchange: String,
        routing_key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl<M> Publisher<M>
where
    M: Manager,
    M::Connection: Transport,
{
    pub fn new(pool: ConnectionPool<M>) -> Self {
        Self { pool }
    }

    /// Publish `payload` as `text/plain`.
    pub async fn publish_bytes(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), PublisherError> {
        self.publish(MessageEnvelope::new(exchange, routing_key, payload))
            .await
    }

    /// Publish a message to RabbitMq.
    ///
    /// The content type defaults to `text/plain`; a message id and a timestamp are
    /// generated if the envelope does not carry them.
    #[tracing::instrument(
        name = "publish",
        skip_all,
        fields(exchange = %envelope.exchange_name, routing_key = %envelope.routing_key),
        level = "debug"
    )]
    pub async fn publish(&self, envelope: MessageEnvelope) -> Result<(), PublisherError> {
        let connection = self.pool.get().await?;
        let outcome = Self::publish_on(&connection, envelope).await;
        self.pool.put(connection).await;
        outcome
    }

    async fn publish_on(
        connection: &M::Connection,
        envelope: MessageEnvelope,
    ) -> Result<(), PublisherError> {
        let MessageEnvelope {
            payload,
            exchange_name,
            routing_key,
            properties,
        } = envelope;
        let properties = inject_amqp_properties(properties.unwrap_or_default());

        let channel = connection
            .open_channel()
            .await
            .map_err(PublisherError::Channel)?;
        let outcome = channel
            .publish(&exchange_name, &routing_key, &payload, properties)
            .await
            .map_err(|source| PublisherError::Publish {
                exchange: exchange_name,
                routing_key,
                source,
            });
        close_channel(&channel, "publish").await;
        outcome
    }
}

fn inject_amqp_properties(props: BasicProperties) -> BasicProperties {
    let content_type = props.content_type().clone();
    let props =
        props.with_content_type(content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.into()));
    let props = props.with_delivery_mode(NON_PERSISTENT);

    let current_timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|ct| ct.as_secs());
    let props = if let Some(ct) = current_timestamp {
        let ts = *props.timestamp();
        props.with_timestamp(ts.unwrap_or(ct))
    } else {
        warn!("System time is before 1970");
        props
    };

    let message_id = props.message_id().clone();
    props.with_message_id(message_id.unwrap_or_else(|| Uuid::new_v4().to_string().into()))
}
