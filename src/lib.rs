//! Publishing of domain and integration events to message-broker exchanges.
//!
//! A message declares its [`MessageKind`] statically; the publisher resolves
//! the exchange configured for that kind, stamps the frame as persistent with
//! a version-free type header, serializes the payload through the injected
//! [`Serializer`], and transmits it over a connection scoped to the call.

mod broker;
mod error;
mod exchange;
mod message;
mod publisher;
mod serializer;
mod settings;
mod type_identifier;

#[cfg(feature = "amqp")]
pub use broker::{AmqpChannel, AmqpConnection, AmqpConnector};
pub use broker::{
    BrokerChannel, BrokerConnection, Connector, InMemoryBroker, InMemoryChannel,
    InMemoryConnection, MessageProperties, OutgoingFrame, PublishedFrame, ResourceCounts,
};
pub use error::{ConfigurationError, PublishError, Result, SerializationError, TransportError};
pub use exchange::ExchangeResolver;
pub use message::{DomainMessage, IntegrationMessage, Message, MessageKind, Metadata};
pub use publisher::{type_header, ExchangePublisher, MessagePublisher};
pub use serializer::{BitcodeSerializer, JsonSerializer, Serializer};
pub use settings::{
    ChannelMode, ExchangeSettings, PublisherSettings, DEFAULT_PORT, DEFAULT_VIRTUAL_HOST,
};
pub use type_identifier::{normalize, MAX_TYPE_HEADER_LEN};

// Re-export the token type publish calls take
pub use tokio_util::sync::CancellationToken;
