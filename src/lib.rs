//! `carrot-pool` is a bounded connection pool for RabbitMq, built on top of [`lapin`],
//! together with the few operations an application needs on top of it: declaring its
//! topology, publishing messages and consuming queues.
//!
//! [`Messaging`] is the best starting point: it builds the [`ConnectionPool`](crate::pool::ConnectionPool)
//! from [`Settings`](crate::amqp::configuration::Settings), declares the configured
//! topology and hands out [`Publisher`](crate::publishers::Publisher)s and
//! [`Consumer`](crate::consumers::Consumer)s.
//!
//! ## Examples
//!
//! Check the `demos` directory to see the library in action.

pub mod amqp;
pub mod consumers;
pub mod pool;
pub mod publishers;
pub mod topology;

mod lifecycle;
pub use lifecycle::{Messaging, StartupError};
