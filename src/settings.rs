//! Publisher configuration.
//!
//! Settings are loaded once at startup and only read afterwards. Field names
//! accept both `snake_case` and the `PascalCase` used by application settings
//! documents:
//!
//! ```json
//! {
//!   "RabbitMQ": {
//!     "Hostname": "localhost",
//!     "Username": "guest",
//!     "Password": "guest",
//!     "Publisher": {
//!       "DomainExchange": "products.domain",
//!       "IntegrationExchange": "products.integration"
//!     }
//!   }
//! }
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigurationError;

pub const DEFAULT_PORT: u16 = 5672;
pub const DEFAULT_VIRTUAL_HOST: &str = "/";

/// How channels are allocated while publishing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// One channel for the whole `publish`/`publish_many` call.
    #[default]
    #[serde(alias = "PerCall")]
    PerCall,
    /// A dedicated channel opened and closed around every message.
    #[serde(alias = "PerMessage")]
    PerMessage,
}

/// Exchange names per message kind. Neither has a default.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct ExchangeSettings {
    #[serde(default, alias = "DomainExchange")]
    pub domain_exchange: Option<String>,
    #[serde(default, alias = "IntegrationExchange")]
    pub integration_exchange: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct PublisherSettings {
    #[serde(alias = "Hostname")]
    pub hostname: String,
    #[serde(default = "default_port", alias = "Port")]
    pub port: u16,
    #[serde(default = "default_virtual_host", alias = "VirtualHost")]
    pub virtual_host: String,
    #[serde(alias = "Username")]
    pub username: String,
    #[serde(default, alias = "Password")]
    pub password: String,
    #[serde(default, alias = "Publisher")]
    pub publisher: Option<ExchangeSettings>,
    #[serde(default, alias = "ChannelMode")]
    pub channel_mode: ChannelMode,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_virtual_host() -> String {
    DEFAULT_VIRTUAL_HOST.to_string()
}

impl PublisherSettings {
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port: DEFAULT_PORT,
            virtual_host: default_virtual_host(),
            username: username.into(),
            password: password.into(),
            publisher: None,
            channel_mode: ChannelMode::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_virtual_host(mut self, virtual_host: impl Into<String>) -> Self {
        self.virtual_host = virtual_host.into();
        self
    }

    pub fn with_domain_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.publisher
            .get_or_insert_with(ExchangeSettings::default)
            .domain_exchange = Some(exchange.into());
        self
    }

    pub fn with_integration_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.publisher
            .get_or_insert_with(ExchangeSettings::default)
            .integration_exchange = Some(exchange.into());
        self
    }

    pub fn with_channel_mode(mut self, mode: ChannelMode) -> Self {
        self.channel_mode = mode;
        self
    }

    /// Parse settings from a JSON document whose root is the settings object.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Invalid(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse the named section of an application settings document.
    pub fn from_section(json: &str, section: &str) -> Result<Self, ConfigurationError> {
        let mut document: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Invalid(e.to_string()))?;
        let section_value = document
            .get_mut(section)
            .map(serde_json::Value::take)
            .ok_or_else(|| ConfigurationError::Invalid(format!("section `{section}` not found")))?;

        let settings: Self = serde_json::from_value(section_value)
            .map_err(|e| ConfigurationError::Invalid(format!("section `{section}`: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Invalid(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Check the connection settings.
    ///
    /// Exchange names are not checked here; the resolver rejects a missing
    /// exchange only for the kind of message actually being published.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigurationError::MissingSetting("hostname"));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigurationError::MissingSetting("username"));
        }
        Ok(())
    }
}

impl fmt::Debug for PublisherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherSettings")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("virtual_host", &self.virtual_host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("publisher", &self.publisher)
            .field("channel_mode", &self.channel_mode)
            .finish()
    }
}
