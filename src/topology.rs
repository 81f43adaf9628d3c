//! Declaration of the exchanges, queues and bindings an application relies on.
//!
//! ```
//! use carrot_pool::topology::TopologyDescriptor;
//!
//! // A durable topic exchange `user`, a durable queue `send_email`,
//! // and a binding between the two under `public`.
//! let descriptor = TopologyDescriptor::binding("user", "send_email", "public");
//! # drop(descriptor);
//!
//! // A durable queue that publishers target directly through the default exchange.
//! let descriptor = TopologyDescriptor::queue("audit");
//! # drop(descriptor);
//! ```
use serde::Deserialize;

use crate::amqp::transport::{close_channel, Transport, TransportChannel};
use crate::amqp::{ConnectionFactory, ExchangeKind};
use crate::pool::{ConnectionPool, Manager, PoolError};

/// One exchange/queue/binding triple to ensure exists on the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TopologyDescriptor {
    /// A durable topic exchange, declared if present and not empty.
    #[serde(default)]
    pub exchange_name: Option<String>,
    /// A durable queue, declared if present and not empty.
    #[serde(default)]
    pub queue_name: Option<String>,
    /// The routing key binding the queue to the exchange, when both are present.
    #[serde(default)]
    pub routing_key: String,
}

impl TopologyDescriptor {
    /// A standalone durable queue.
    pub fn queue(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: Some(queue_name.into()),
            ..Self::default()
        }
    }

    /// A standalone durable topic exchange.
    pub fn exchange(exchange_name: impl Into<String>) -> Self {
        Self {
            exchange_name: Some(exchange_name.into()),
            ..Self::default()
        }
    }

    /// A durable topic exchange, a durable queue, and a binding between the two.
    pub fn binding(
        exchange_name: impl Into<String>,
        queue_name: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            exchange_name: Some(exchange_name.into()),
            queue_name: Some(queue_name.into()),
            routing_key: routing_key.into(),
        }
    }
}

/// Error returned when declaring topology with [`TopologyManager`].
#[derive(thiserror::Error, Debug)]
pub enum DeclareError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("Failed to open a channel to declare the topology")]
    Channel(#[source] anyhow::Error),
    #[error("Failed to declare queue `{queue}`")]
    Queue {
        queue: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to declare exchange `{exchange}`")]
    Exchange {
        exchange: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to bind queue `{queue}` to exchange `{exchange}` with routing key `{routing_key}`")]
    Bind {
        queue: String,
        exchange: String,
        routing_key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Declares exchanges, queues and bindings through a [`ConnectionPool`].
///
/// Meant to run once at startup: a failure usually means the application cannot work
/// and should not start.
pub struct TopologyManager<M: Manager = ConnectionFactory> {
    pool: ConnectionPool<M>,
}

impl<M: Manager> Clone for TopologyManager<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<M> TopologyManager<M>
where
    M: Manager,
    M::Connection: Transport,
{
    pub fn new(pool: ConnectionPool<M>) -> Self {
        Self { pool }
    }

    /// Declare every descriptor, in order, over a single channel.
    ///
    /// For each descriptor the queue is declared first, then the exchange, then the
    /// binding. The first failure stops the batch: declarations that already went through
    /// are not rolled back. They are idempotent, so running `declare_all` again once the
    /// problem is fixed is safe.
    #[tracing::instrument(name = "declare_topology", skip_all, fields(descriptors = descriptors.len()))]
    pub async fn declare_all(&self, descriptors: &[TopologyDescriptor]) -> Result<(), DeclareError> {
        let connection = self.pool.get().await?;
        let outcome = Self::declare_on(&connection, descriptors).await;
        self.pool.put(connection).await;
        if let Err(e) = &outcome {
            tracing::error!(error = ?e, "Failed to declare the RabbitMq topology");
        }
        outcome
    }

    /// Declare a single durable queue.
    pub async fn declare_queue(&self, queue_name: &str) -> Result<(), DeclareError> {
        self.declare_all(&[TopologyDescriptor::queue(queue_name)])
            .await
    }

    async fn declare_on(
        connection: &M::Connection,
        descriptors: &[TopologyDescriptor],
    ) -> Result<(), DeclareError> {
        let channel = connection
            .open_channel()
            .await
            .map_err(DeclareError::Channel)?;
        let mut outcome = Ok(());
        for descriptor in descriptors {
            outcome = declare(&channel, descriptor).await;
            if outcome.is_err() {
                break;
            }
        }
        close_channel(&channel, "declare").await;
        outcome
    }
}

async fn declare<C: TransportChannel>(
    channel: &C,
    descriptor: &TopologyDescriptor,
) -> Result<(), DeclareError> {
    // An empty name in configuration means "not set", not the server-named queue.
    let queue = descriptor.queue_name.as_deref().filter(|q| !q.is_empty());
    let exchange = descriptor
        .exchange_name
        .as_deref()
        .filter(|e| !e.is_empty());

    if let Some(queue) = queue {
        channel
            .declare_queue(queue)
            .await
            .map_err(|source| DeclareError::Queue {
                queue: queue.into(),
                source,
            })?;
    }

    if let Some(exchange) = exchange {
        channel
            .declare_exchange(exchange, ExchangeKind::Topic)
            .await
            .map_err(|source| DeclareError::Exchange {
                exchange: exchange.into(),
                source,
            })?;

        if let Some(queue) = queue {
            channel
                .bind_queue(queue, exchange, &descriptor.routing_key)
                .await
                .map_err(|source| DeclareError::Bind {
                    queue: queue.into(),
                    exchange: exchange.into(),
                    routing_key: descriptor.routing_key.clone(),
                    source,
                })?;
        }
    }

    Ok(())
}
