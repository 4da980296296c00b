use crate::error::ConfigurationError;
use crate::message::{Message, MessageKind};
use crate::settings::{ExchangeSettings, PublisherSettings};

/// Maps a message kind to its configured exchange.
///
/// A missing or empty exchange name is a [`ConfigurationError`]; there is no
/// fallback to the broker's default exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeResolver {
    domain: Option<String>,
    integration: Option<String>,
}

impl ExchangeResolver {
    pub fn new(exchanges: Option<&ExchangeSettings>) -> Self {
        let exchanges = exchanges.cloned().unwrap_or_default();
        Self {
            domain: exchanges.domain_exchange,
            integration: exchanges.integration_exchange,
        }
    }

    pub fn from_settings(settings: &PublisherSettings) -> Self {
        Self::new(settings.publisher.as_ref())
    }

    pub fn resolve(&self, kind: MessageKind) -> Result<&str, ConfigurationError> {
        let exchange = match kind {
            MessageKind::Integration => self.integration.as_deref(),
            MessageKind::Domain => self.domain.as_deref(),
        };

        exchange
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigurationError::ExchangesNotConfigured { kind })
    }

    /// Exchange for the declared kind of `M`.
    pub fn resolve_for<M: Message>(&self) -> Result<&str, ConfigurationError> {
        self.resolve(M::KIND)
    }
}
