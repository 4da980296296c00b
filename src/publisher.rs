//! Publishing messages to broker exchanges.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::broker::{BrokerChannel, BrokerConnection, Connector, MessageProperties, OutgoingFrame};
use crate::error::{PublishError, Result, SerializationError, TransportError};
use crate::exchange::ExchangeResolver;
use crate::message::Message;
use crate::serializer::Serializer;
use crate::settings::{ChannelMode, PublisherSettings};
use crate::type_identifier::{normalize, MAX_TYPE_HEADER_LEN};

/// Publishes messages of type `M` to the exchange of their kind.
///
/// Failures are surfaced as is; the caller decides whether to retry.
#[async_trait]
pub trait MessagePublisher<M: Message>: Send + Sync {
    /// Publish one message.
    async fn publish(
        &self,
        message: &M,
        routing_key: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<()>;

    /// Publish every message in order over a single connection.
    ///
    /// The first failure aborts the rest of the batch. Messages before it
    /// have already been transmitted; messages after it are never attempted.
    async fn publish_many(
        &self,
        messages: &[M],
        routing_key: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<()>;
}

/// Publisher that opens its own connection for every call.
///
/// Holds only read-only state, so one instance can serve concurrent calls;
/// each call gets its own connection and channel(s), closed before it
/// returns on every path.
///
/// ```
/// use exchange_publisher::{
///     ExchangePublisher, InMemoryBroker, IntegrationMessage, JsonSerializer, MessagePublisher,
///     PublisherSettings,
/// };
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test_block_on(async {
/// let settings = PublisherSettings::new("localhost", "guest", "guest")
///     .with_integration_exchange("products.integration");
/// let broker = InMemoryBroker::new();
/// let publisher = ExchangePublisher::new(broker.clone(), JsonSerializer, &settings);
///
/// let message = IntegrationMessage::new("msg-1", "ProductCreated", 42u32);
/// publisher
///     .publish(&message, None, &CancellationToken::new())
///     .await
///     .unwrap();
///
/// assert_eq!(broker.frames_on("products.integration").len(), 1);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct ExchangePublisher<C, S> {
    connector: C,
    serializer: S,
    exchanges: ExchangeResolver,
    channel_mode: ChannelMode,
}

impl<C, S> ExchangePublisher<C, S> {
    pub fn new(connector: C, serializer: S, settings: &PublisherSettings) -> Self {
        Self {
            connector,
            serializer,
            exchanges: ExchangeResolver::from_settings(settings),
            channel_mode: settings.channel_mode,
        }
    }

    pub fn with_channel_mode(mut self, mode: ChannelMode) -> Self {
        self.channel_mode = mode;
        self
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.channel_mode
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }
}

#[cfg(feature = "amqp")]
impl<S> ExchangePublisher<crate::broker::AmqpConnector, S> {
    /// Publisher talking to the RabbitMQ broker described by `settings`.
    pub fn amqp(settings: &PublisherSettings, serializer: S) -> Self {
        Self::new(crate::broker::AmqpConnector::new(settings), serializer, settings)
    }
}

impl<C: Connector, S: Serializer> ExchangePublisher<C, S> {
    /// Build the frame `message` would be published as, without any I/O.
    pub fn prepare_frame<M: Message>(
        &self,
        message: &M,
        routing_key: Option<&str>,
    ) -> Result<OutgoingFrame> {
        let exchange = self.exchanges.resolve_for::<M>()?;
        self.frame(exchange, message, routing_key)
    }

    fn frame<M: Message>(
        &self,
        exchange: &str,
        message: &M,
        routing_key: Option<&str>,
    ) -> Result<OutgoingFrame> {
        let type_header = type_header(message)?;
        let body = self.serializer.serialize_object_to_bytes(message)?;

        Ok(OutgoingFrame {
            exchange: exchange.to_string(),
            routing_key: routing_key.unwrap_or_default().to_string(),
            properties: MessageProperties::persistent(type_header)
                .with_content_type(self.serializer.content_type()),
            body,
        })
    }

    async fn publish_all<M: Message>(
        &self,
        messages: &[M],
        routing_key: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let exchange = self.exchanges.resolve_for::<M>()?;
        if messages.is_empty() {
            return Ok(());
        }
        ensure_not_cancelled(cancellation)?;

        let connection = self.connector.connect().await?;
        let outcome = match self.channel_mode {
            ChannelMode::PerCall => {
                self.publish_on_shared_channel(&connection, exchange, messages, routing_key, cancellation)
                    .await
            }
            ChannelMode::PerMessage => {
                self.publish_on_own_channels(&connection, exchange, messages, routing_key, cancellation)
                    .await
            }
        };
        settle(outcome, connection.close().await, "connection")
    }

    async fn publish_on_shared_channel<M: Message>(
        &self,
        connection: &C::Connection,
        exchange: &str,
        messages: &[M],
        routing_key: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let channel = connection.open_channel().await?;

        let mut outcome = Ok(());
        for message in messages {
            outcome = match ensure_not_cancelled(cancellation) {
                Ok(()) => self.transmit(&channel, exchange, message, routing_key).await,
                Err(err) => Err(err),
            };
            if outcome.is_err() {
                break;
            }
        }

        settle(outcome, channel.close().await, "channel")
    }

    async fn publish_on_own_channels<M: Message>(
        &self,
        connection: &C::Connection,
        exchange: &str,
        messages: &[M],
        routing_key: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        for message in messages {
            ensure_not_cancelled(cancellation)?;
            let channel = connection.open_channel().await?;
            let outcome = self.transmit(&channel, exchange, message, routing_key).await;
            settle(outcome, channel.close().await, "channel")?;
        }
        Ok(())
    }

    async fn transmit<M: Message, Ch: BrokerChannel>(
        &self,
        channel: &Ch,
        exchange: &str,
        message: &M,
        routing_key: Option<&str>,
    ) -> Result<()> {
        let frame = self.frame(exchange, message, routing_key)?;
        channel.publish(&frame).await?;

        tracing::debug!(
            exchange = %frame.exchange,
            routing_key = %frame.routing_key,
            type_header = %frame.properties.type_header,
            bytes = frame.body.len(),
            "published message"
        );
        Ok(())
    }
}

#[async_trait]
impl<C, S, M> MessagePublisher<M> for ExchangePublisher<C, S>
where
    C: Connector,
    S: Serializer,
    M: Message,
{
    async fn publish(
        &self,
        message: &M,
        routing_key: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        self.publish_all(std::slice::from_ref(message), routing_key, cancellation)
            .await
    }

    async fn publish_many(
        &self,
        messages: &[M],
        routing_key: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        self.publish_all(messages, routing_key, cancellation).await?;
        tracing::info!(count = messages.len(), kind = %M::KIND, "published batch");
        Ok(())
    }
}

/// Normalized type header of `message`, checked against the broker limit.
pub fn type_header<M: Message>(message: &M) -> Result<String, SerializationError> {
    let header = normalize(&message.type_descriptor());
    if header.len() > MAX_TYPE_HEADER_LEN {
        return Err(SerializationError::TypeHeaderTooLong {
            len: header.len(),
            max: MAX_TYPE_HEADER_LEN,
        });
    }
    Ok(header)
}

fn ensure_not_cancelled(cancellation: &CancellationToken) -> Result<()> {
    if cancellation.is_cancelled() {
        return Err(PublishError::Cancelled);
    }
    Ok(())
}

/// Combine an operation's outcome with the result of releasing its resource.
///
/// The outcome wins. A failed release is only logged: by then the frames are
/// already with the broker, and reporting an error would invite a duplicate
/// retry.
fn settle(
    outcome: Result<()>,
    released: std::result::Result<(), TransportError>,
    resource: &'static str,
) -> Result<()> {
    if let Err(err) = released {
        tracing::warn!(resource, error = %err, "failed to release broker resource");
    }
    outcome
}
