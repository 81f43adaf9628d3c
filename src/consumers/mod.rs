//! Facilities to pull messages from RabbitMq queues. Check out [`Consumer`] as a starting point.
mod consumer;
mod error;
mod handler;

pub use consumer::Consumer;
pub use error::ConsumerError;
pub use handler::Handler;
