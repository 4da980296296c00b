use thiserror::Error;

use crate::message::MessageKind;

/// Missing or invalid publisher configuration.
///
/// Always detected before any broker I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("exchanges not configured: no {kind} exchange, please configure the exchanges in the settings")]
    ExchangesNotConfigured { kind: MessageKind },

    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Connection, channel or broker protocol failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("channel failed: {0}")]
    Channel(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("close failed: {0}")]
    Close(String),

    #[error("broker lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// The outgoing frame could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("{format} encoding failed: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },

    #[error("type header is {len} bytes, the broker accepts at most {max}")]
    TypeHeaderTooLong { len: usize, max: usize },
}

/// Error returned by publish operations.
///
/// Nothing is retried internally; every variant is surfaced to the caller as is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("publish cancelled")]
    Cancelled,
}

impl PublishError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, PublishError::Configuration(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, PublishError::Transport(_))
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, PublishError::Serialization(_))
    }
}

/// Result alias for publish operations.
pub type Result<T, E = PublishError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_the_kind() {
        let err = PublishError::from(ConfigurationError::ExchangesNotConfigured {
            kind: MessageKind::Integration,
        });
        assert!(err.is_configuration());
        assert!(err.to_string().contains("integration"));
        assert!(err.to_string().contains("exchanges not configured"));
    }

    #[test]
    fn transport_and_serialization_are_distinguished() {
        let transport = PublishError::from(TransportError::Connect("refused".into()));
        assert!(transport.is_transport());
        assert!(!transport.is_serialization());

        let serialization = PublishError::from(SerializationError::TypeHeaderTooLong {
            len: 300,
            max: 255,
        });
        assert!(serialization.is_serialization());
        assert_eq!(
            serialization.to_string(),
            "type header is 300 bytes, the broker accepts at most 255"
        );
    }
}
