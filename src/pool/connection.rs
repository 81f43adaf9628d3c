//! Implements [`Manager`] for [`ConnectionFactory`].

use super::Manager;
use crate::amqp::ConnectionFactory;
use lapin::Connection;
use tracing::debug;

/// AMQP `reply-success`.
const REPLY_SUCCESS: u16 = 200;

#[async_trait::async_trait]
impl Manager for ConnectionFactory {
    type Connection = Connection;

    async fn connect(&self) -> Result<Connection, anyhow::Error> {
        self.new_connection().await
    }

    fn is_healthy(&self, connection: &Connection) -> bool {
        connection.status().connected()
    }

    async fn disconnect(&self, connection: Connection) {
        if let Err(e) = connection
            .close(REPLY_SUCCESS, "Closed by the connection pool")
            .await
        {
            debug!(
                "Connection was not in an healthy state {:?} when closing it: {}",
                connection.status().state(),
                e
            );
        }
    }
}
