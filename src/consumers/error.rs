use crate::pool::PoolError;

/// Error returned when setting up a subscription with [`Consumer`](super::Consumer).
///
/// Once a subscription is running there are no per-message errors: deliveries are
/// auto-acknowledged and the loop simply ends when the broker stops delivering.
#[derive(thiserror::Error, Debug)]
pub enum ConsumerError {
    /// No connection could be checked out. The pool error is passed through untouched.
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("Failed to open a channel to consume from queue `{queue}`")]
    Channel {
        queue: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to register a consumer on queue `{queue}`")]
    Consume {
        queue: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to install the SIGTERM handler")]
    Signal(#[source] anyhow::Error),
}
