//! Helpers for connecting to a rabbitmq broker

pub mod configuration;
mod delivery;
mod factory;
pub mod transport;

pub use delivery::Delivery;
pub use factory::ConnectionFactory;
pub use lapin::{Channel, Connection, ExchangeKind};

pub use lapin::{options, types, BasicProperties};
