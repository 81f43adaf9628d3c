//! Startup and shutdown of the messaging layer.
use crate::amqp::configuration::Settings;
use crate::amqp::transport::Transport;
use crate::amqp::ConnectionFactory;
use crate::consumers::Consumer;
use crate::pool::{ConnectionPool, InvalidPoolConfig, Manager};
use crate::publishers::Publisher;
use crate::topology::{DeclareError, TopologyDescriptor, TopologyManager};

/// The messaging layer could not be brought up.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("Invalid connection pool configuration")]
    PoolConfig(#[from] InvalidPoolConfig),
    #[error("Invalid RabbitMq connection settings")]
    Connection(#[source] anyhow::Error),
    #[error("Failed to declare the RabbitMq topology")]
    Topology(#[from] DeclareError),
}

/// An initialised connection pool, with its topology declared.
///
/// `Messaging` is the explicit replacement for a process-wide pool: build one at startup,
/// hand out [`Publisher`]s and [`Consumer`]s to whoever needs them, and call
/// [`Messaging::shutdown`] on the way out.
///
/// ```rust
/// use carrot_pool::amqp::configuration::Settings;
/// use carrot_pool::Messaging;
///
/// async fn run(settings: Settings) -> anyhow::Result<()> {
///     let messaging = Messaging::start(&settings).await?;
///     messaging
///         .publisher()
///         .publish_bytes("user", "public", b"hello")
///         .await?;
///     messaging.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Messaging<M: Manager = ConnectionFactory> {
    pool: ConnectionPool<M>,
}

impl Messaging<ConnectionFactory> {
    /// Connect to the broker described by `settings` and declare its topology.
    #[tracing::instrument(name = "messaging_start", skip_all)]
    pub async fn start(settings: &Settings) -> Result<Self, StartupError> {
        let config = settings.pool_config()?;
        let factory = ConnectionFactory::new_from_config(&settings.rabbit_mq)
            .map_err(StartupError::Connection)?;
        Self::from_pool(ConnectionPool::with_manager(&config, factory), &settings.topology).await
    }
}

impl<M> Messaging<M>
where
    M: Manager,
    M::Connection: Transport,
{
    /// Declare `topology` using `pool`.
    ///
    /// If the declaration fails the pool is closed before returning the error.
    pub async fn from_pool(
        pool: ConnectionPool<M>,
        topology: &[TopologyDescriptor],
    ) -> Result<Self, StartupError> {
        if let Err(e) = TopologyManager::new(pool.clone()).declare_all(topology).await {
            pool.close().await;
            return Err(e.into());
        }
        tracing::info!(
            max_open = pool.status().max_open,
            max_idle = pool.status().max_idle,
            "Messaging layer ready"
        );
        Ok(Self { pool })
    }

    pub fn publisher(&self) -> Publisher<M> {
        Publisher::new(self.pool.clone())
    }

    pub fn consumer(&self) -> Consumer<M> {
        Consumer::new(self.pool.clone())
    }

    pub fn topology(&self) -> TopologyManager<M> {
        TopologyManager::new(self.pool.clone())
    }

    pub fn pool(&self) -> &ConnectionPool<M> {
        &self.pool
    }

    /// Close the idle connections and stop handing out new ones.
    ///
    /// Running consumers keep their connection until their subscription ends; it is
    /// closed when they hand it back.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down the messaging layer");
        self.pool.close().await;
    }
}
