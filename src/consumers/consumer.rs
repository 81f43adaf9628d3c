use crate::amqp::transport::{close_channel, DeliveryStream, Transport, TransportChannel};
use crate::amqp::ConnectionFactory;
use crate::consumers::{ConsumerError, Handler};
use crate::pool::{ConnectionPool, Manager};
use futures_util::{Future, FutureExt, StreamExt};
use shutdown_handler::ShutdownHandler;
use tracing::{info, warn};
use uuid::Uuid;

/// Pulls messages from queues through a [`ConnectionPool`].
///
/// # Connection usage
///
/// A running subscription pins the connection it checked out until it ends: with `n`
/// consumers running, only `max_open - n` connections are left for everything else.
/// Size the pool accordingly.
///
/// # Blocking
///
/// The `consume*` methods only return once the subscription is over: run each of them on
/// its own task.
///
/// ```rust
/// use carrot_pool::amqp::Delivery;
/// use carrot_pool::consumers::Consumer;
/// use carrot_pool::pool::ConnectionPool;
///
/// async fn send_emails(pool: ConnectionPool) -> Result<(), carrot_pool::consumers::ConsumerError> {
///     Consumer::new(pool)
///         .consume_until_sigterm("send_email", |delivery: Delivery| async move {
///             println!("{} bytes to send", delivery.data.len());
///         })
///         .await
/// }
/// ```
pub struct Consumer<M: Manager = ConnectionFactory> {
    pool: ConnectionPool<M>,
}

impl<M: Manager> Clone for Consumer<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<M> Consumer<M>
where
    M: Manager,
    M::Connection: Transport,
{
    pub fn new(pool: ConnectionPool<M>) -> Self {
        Self { pool }
    }

    /// Subscribe to `queue` and feed every delivery to `handler`, one at a time, in
    /// delivery order.
    ///
    /// Returns `Ok(())` when the broker (or a broken connection) ends the subscription.
    pub async fn consume<H: Handler>(&self, queue: &str, handler: H) -> Result<(), ConsumerError> {
        self.consume_until_shutdown(queue, handler, std::future::pending())
            .await
    }

    /// Same as [`Consumer::consume`], but the subscription is also cancelled when the
    /// process receives SIGTERM.
    pub async fn consume_until_sigterm<H: Handler>(
        &self,
        queue: &str,
        handler: H,
    ) -> Result<(), ConsumerError> {
        let shutdown =
            ShutdownHandler::sigterm().map_err(|e| ConsumerError::Signal(e.into()))?;
        self.consume_until_shutdown(queue, handler, shutdown.wait_for_signal())
            .await
    }

    /// Same as [`Consumer::consume`], but the subscription is also cancelled when
    /// `shutdown` resolves.
    ///
    /// On shutdown the consumer is cancelled with the broker; deliveries already on their
    /// way are still handed to `handler` before returning.
    #[tracing::instrument(name = "consume", skip_all, fields(queue_name = %queue))]
    pub async fn consume_until_shutdown<H: Handler>(
        &self,
        queue: &str,
        handler: H,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ConsumerError> {
        let connection = self.pool.get().await?;
        let outcome = Self::consume_on(&connection, queue, &handler, shutdown).await;
        self.pool.put(connection).await;
        outcome
    }

    async fn consume_on<H: Handler>(
        connection: &M::Connection,
        queue: &str,
        handler: &H,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ConsumerError> {
        let channel = connection
            .open_channel()
            .await
            .map_err(|source| ConsumerError::Channel {
                queue: queue.into(),
                source,
            })?;

        let consumer_tag = Uuid::new_v4().to_string();
        let outcome = match channel.consume(queue, &consumer_tag).await {
            Ok(deliveries) => {
                receive(&channel, &consumer_tag, deliveries, handler, shutdown).await;
                Ok(())
            }
            Err(source) => Err(ConsumerError::Consume {
                queue: queue.into(),
                source,
            }),
        };

        close_channel(&channel, "consume").await;
        outcome
    }
}

/// Hand deliveries to `handler` until the stream ends.
async fn receive<C: TransportChannel, H: Handler>(
    channel: &C,
    consumer_tag: &str,
    mut deliveries: DeliveryStream,
    handler: &H,
    shutdown: impl Future<Output = ()>,
) {
    let shutdown = shutdown.fuse();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Prefer handling a shutdown over processing more deliveries.
            biased;

            _ = &mut shutdown => {
                info!("consumer received shutdown event");
                // The stream ends once the broker confirms the cancellation.
                if let Err(e) = channel.cancel(consumer_tag).await {
                    warn!("Failed to cancel the consumer, giving up on pending deliveries: {:?}", e);
                    break;
                }
            }

            delivery = deliveries.next() => match delivery {
                Some(Ok(delivery)) => handler.handle(delivery).await,
                Some(Err(e)) => {
                    warn!("Consumer stream failed: {:?}", e);
                    break;
                }
                None => break,
            }
        }
    }

    info!("consumer stopped");
}
