//! AMQP broker backed by `lapin`.
//!
//! Each [`AmqpConnector::connect`] opens a fresh broker connection; nothing is
//! pooled. Frames are published with delivery mode 2 (persistent) and the
//! normalized type header in the AMQP `type` property. Every channel is put
//! in confirm mode, so a publish is only reported done once the broker acks
//! it; a nack is a [`TransportError::Publish`].

use async_trait::async_trait;
use lapin::{
    //
    options::{BasicPublishOptions, ConfirmSelectOptions},
    publisher_confirm::Confirmation,
    types::ShortString,
    uri::{AMQPAuthority, AMQPUri, AMQPUserInfo},
    BasicProperties,
    Channel,
    Connection,
    ConnectionProperties,
};

use super::{BrokerChannel, BrokerConnection, Connector, OutgoingFrame};
use crate::error::TransportError;
use crate::settings::PublisherSettings;

/// Delivery mode asking the broker to persist the message.
const PERSISTENT_DELIVERY_MODE: u8 = 2;

const REPLY_SUCCESS: u16 = 200;

/// Opens lapin connections from publisher settings.
#[derive(Clone)]
pub struct AmqpConnector {
    uri: AMQPUri,
    properties: ConnectionProperties,
}

impl AmqpConnector {
    pub fn new(settings: &PublisherSettings) -> Self {
        let uri = AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: settings.username.clone(),
                    password: settings.password.clone(),
                },
                host: settings.hostname.clone(),
                port: settings.port,
            },
            vhost: settings.virtual_host.clone(),
            ..Default::default()
        };

        Self {
            uri,
            properties: ConnectionProperties::default(),
        }
    }

    pub fn with_connection_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    type Connection = AmqpConnection;

    async fn connect(&self) -> Result<Self::Connection, TransportError> {
        let connection = Connection::connect_uri(self.uri.clone(), self.properties.clone())
            .await
            .map_err(|e| {
                TransportError::Connect(format!(
                    "amqp: {}:{}: {e}",
                    self.uri.authority.host, self.uri.authority.port
                ))
            })?;

        tracing::debug!(
            host = %self.uri.authority.host,
            port = self.uri.authority.port,
            vhost = %self.uri.vhost,
            "AMQP connection opened"
        );
        Ok(AmqpConnection { connection })
    }
}

pub struct AmqpConnection {
    connection: Connection,
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    type Channel = AmqpChannel;

    async fn open_channel(&self) -> Result<Self::Channel, TransportError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| TransportError::Channel(format!("amqp: create channel failed: {e}")))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| TransportError::Channel(format!("amqp: confirm select failed: {e}")))?;
        Ok(AmqpChannel { channel })
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connection
            .close(REPLY_SUCCESS, "Normal shutdown")
            .await
            .map_err(|e| TransportError::Close(format!("amqp: close connection failed: {e}")))
    }
}

pub struct AmqpChannel {
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn publish(&self, frame: &OutgoingFrame) -> Result<(), TransportError> {
        let mut properties = BasicProperties::default()
            .with_type(ShortString::from(frame.properties.type_header.clone()));
        if frame.properties.persistent {
            properties = properties.with_delivery_mode(PERSISTENT_DELIVERY_MODE);
        }
        if let Some(content_type) = &frame.properties.content_type {
            properties = properties.with_content_type(ShortString::from(content_type.clone()));
        }

        self.channel
            .basic_publish(
                &frame.exchange,
                &frame.routing_key,
                BasicPublishOptions::default(),
                &frame.body,
                properties,
            )
            .await
            .map_err(|e| TransportError::Publish(format!("amqp: publish failed: {e}")))?
            .await
            .map_err(|e| TransportError::Publish(format!("amqp: publish not confirmed: {e}")))
            .and_then(confirmed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.channel
            .close(REPLY_SUCCESS, "Normal shutdown")
            .await
            .map_err(|e| TransportError::Close(format!("amqp: close channel failed: {e}")))
    }
}

/// Broker verdict on a publish made on a confirm-mode channel.
fn confirmed(confirmation: Confirmation) -> Result<(), TransportError> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(TransportError::Publish(
            "amqp: broker nacked the message".to_string(),
        )),
        Confirmation::NotRequested => Err(TransportError::Publish(
            "amqp: channel is not in confirm mode".to_string(),
        )),
    }
}
