//! Publishable messages.
//!
//! Every message declares its [`MessageKind`] statically through
//! [`Message::KIND`], so the exchange a message goes to is decided by its type
//! at the call site rather than by inspecting it at runtime.

use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Static classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Meaningful only within the publishing service.
    Domain,
    /// Consumed across service boundaries.
    Integration,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Domain => write!(f, "domain"),
            MessageKind::Integration => write!(f, "integration"),
        }
    }
}

/// A message that can be handed to a publisher.
///
/// ```
/// use exchange_publisher::{Message, MessageKind};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct StockReserved {
///     product_id: u32,
/// }
///
/// impl Message for StockReserved {
///     const KIND: MessageKind = MessageKind::Domain;
/// }
/// ```
pub trait Message: Serialize + Send + Sync {
    /// Which exchange family this message type belongs to.
    const KIND: MessageKind;

    /// Qualified descriptor of the message type, before normalization.
    ///
    /// Defaults to the Rust type path. Override to publish a descriptor that
    /// consumers on other stacks already route by; version metadata in it is
    /// stripped before it reaches the wire.
    fn type_descriptor(&self) -> Cow<'_, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// Metadata carried by the message envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub correlation_id: Option<String>,
    pub created_at_unix_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
}

impl Metadata {
    fn now() -> Self {
        let created_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(unix_millis)
            .unwrap_or_default();
        Self {
            correlation_id: None,
            created_at_unix_ms,
            headers: Vec::new(),
        }
    }
}

/// Milliseconds in `elapsed`, saturating at `u64::MAX`.
fn unix_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

macro_rules! envelope {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name<T> {
            pub message_identifier: String,
            pub name: String,
            pub content: T,
            pub metadata: Metadata,
        }

        impl<T> $name<T> {
            pub fn new(
                message_identifier: impl Into<String>,
                name: impl Into<String>,
                content: T,
            ) -> Self {
                Self {
                    message_identifier: message_identifier.into(),
                    name: name.into(),
                    content,
                    metadata: Metadata::now(),
                }
            }

            pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
                self.metadata.correlation_id = Some(correlation_id.into());
                self
            }

            pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
                self.metadata.headers.push((key.into(), value.into()));
                self
            }
        }

        impl<T: Serialize + Send + Sync> Message for $name<T> {
            const KIND: MessageKind = $kind;
        }
    };
}

envelope!(
    /// Envelope for an event local to the publishing service.
    DomainMessage,
    MessageKind::Domain
);

envelope!(
    /// Envelope for an event consumed by other services.
    IntegrationMessage,
    MessageKind::Integration
);
