/// `Manager` tells a [`ConnectionPool`](super::ConnectionPool) how to dial, inspect and
/// tear down the connections it hands out.
///
/// The pool never talks to the broker directly: it only reserves capacity and calls into
/// its `Manager`. [`ConnectionFactory`](crate::amqp::ConnectionFactory) is the `lapin`-backed
/// implementation; tests plug in an in-memory broker.
#[async_trait::async_trait]
pub trait Manager: Send + Sync + 'static {
    /// The connection type handed out by the pool.
    type Connection: Send + 'static;

    /// Dial a new connection to the broker.
    async fn connect(&self) -> Result<Self::Connection, anyhow::Error>;

    /// `false` if the connection can no longer be used (closed by the broker, socket
    /// errored, ...). Unhealthy connections are discarded instead of being reused.
    fn is_healthy(&self, connection: &Self::Connection) -> bool;

    /// Close a connection the pool is discarding.
    ///
    /// Failures are not reported back: the connection is gone either way.
    async fn disconnect(&self, connection: Self::Connection);
}
