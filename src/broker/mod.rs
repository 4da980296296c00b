//! Broker seam - connections, channels and the frames sent over them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ExchangePublisher (per service)              │
//! │  - resolves exchange, normalizes type header, serializes    │
//! └─────────────────────────────────────────────────────────────┘
//!                            │ OutgoingFrame
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          Connector → BrokerConnection → BrokerChannel        │
//! │  connect() / open_channel() / publish(frame) / close()      │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//! ┌──────────────────┐              ┌──────────────────────┐
//! │  InMemoryBroker  │              │    AmqpConnector     │
//! │   (included)     │              │ (lapin, `amqp` feat) │
//! └──────────────────┘              └──────────────────────┘
//! ```
//!
//! Connections and channels are scoped to a single publish call. The
//! publisher closes them itself on every exit path; implementations should
//! not rely on being dropped.

#[cfg(feature = "amqp")]
mod amqp;
mod in_memory;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpChannel, AmqpConnection, AmqpConnector};
pub use in_memory::{
    InMemoryBroker, InMemoryChannel, InMemoryConnection, PublishedFrame, ResourceCounts,
};

use async_trait::async_trait;

use crate::error::TransportError;

/// Properties attached to every published frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageProperties {
    /// Ask the broker to store the message durably until consumed.
    pub persistent: bool,
    /// Normalized type identifier of the payload.
    pub type_header: String,
    pub content_type: Option<String>,
}

impl MessageProperties {
    /// Persistent delivery with the given type header.
    pub fn persistent(type_header: impl Into<String>) -> Self {
        Self {
            persistent: true,
            type_header: type_header.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// One message as it goes onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub exchange: String,
    /// Empty when the caller gave no routing key.
    pub routing_key: String,
    pub properties: MessageProperties,
    pub body: Vec<u8>,
}

/// Opens transport-level sessions to the broker.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: BrokerConnection;

    async fn connect(&self) -> Result<Self::Connection, TransportError>;
}

/// A transport-level session. Must outlive every channel opened from it.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    type Channel: BrokerChannel;

    async fn open_channel(&self) -> Result<Self::Channel, TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// A logical sub-connection frames are published on.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    async fn publish(&self, frame: &OutgoingFrame) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}
