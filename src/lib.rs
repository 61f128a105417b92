pub mod ack_registry;
pub mod client;
pub mod completion;
pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod packet_id;
pub mod packets;
pub mod protocol;

pub use client::{ConnAck, DeliveryClient, Event, IncomingPublish, PublishOptions, SubscriptionGrant};
pub use completion::Completion;
pub use config::{ConnectionConfig, Credentials, LastWill};
pub use connection::Transport;
pub use error::ClientError;
pub use packets::subscribe_packet::Subscription;
pub use protocol::QoS;
