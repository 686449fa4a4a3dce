//! Event bridge and transaction correlation engine.

pub mod channel;
pub mod client;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod lifecycle;
pub mod observability;
pub mod subscriber;

pub use channel::{notification_channel, NotificationReceiver, NotificationSender};
pub use config::schema::BridgeConfig;
pub use engine::CorrelationEngine;
pub use lifecycle::{Shutdown, ShutdownCoordinator};
pub use subscriber::StreamSubscriber;
