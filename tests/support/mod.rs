#![allow(dead_code)]

pub mod messages;

use exchange_publisher::{
    ChannelMode, ExchangePublisher, InMemoryBroker, JsonSerializer, PublisherSettings,
};

pub const DOMAIN_EXCHANGE: &str = "products.domain";
pub const INTEGRATION_EXCHANGE: &str = "products.integration";

pub fn settings() -> PublisherSettings {
    PublisherSettings::new("localhost", "guest", "guest")
        .with_domain_exchange(DOMAIN_EXCHANGE)
        .with_integration_exchange(INTEGRATION_EXCHANGE)
}

/// Publisher over a fresh in-memory broker, plus a handle to inspect it.
pub fn publisher(
    mode: ChannelMode,
) -> (ExchangePublisher<InMemoryBroker, JsonSerializer>, InMemoryBroker) {
    publisher_with(settings().with_channel_mode(mode))
}

pub fn publisher_with(
    settings: PublisherSettings,
) -> (ExchangePublisher<InMemoryBroker, JsonSerializer>, InMemoryBroker) {
    let broker = InMemoryBroker::new();
    let publisher = ExchangePublisher::new(broker.clone(), JsonSerializer, &settings);
    (publisher, broker)
}

/// Log output captured by a test-local `tracing` subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Install a subscriber for the current thread that writes into this buffer.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let logs = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("exchange_publisher=warn"))
            .with_ansi(false)
            .with_writer(move || logs.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        let buffer = self
            .buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
