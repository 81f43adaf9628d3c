/// Failure to check a connection out of a [`ConnectionPool`](super::ConnectionPool).
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// Dialing the broker failed (network, authentication, TLS, ...).
    #[error("Failed to connect to the RabbitMq broker")]
    Connect(#[source] anyhow::Error),
    /// Every connection slot is taken. The caller may retry later.
    #[error("All {max_open} connections are in use")]
    Exhausted { max_open: usize },
    /// The pool has been closed and no longer hands out connections.
    #[error("The connection pool has been closed")]
    Closed,
}

impl PoolError {
    /// `true` for failures that may go away if the caller retries later.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}
