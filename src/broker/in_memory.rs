//! In-memory broker for testing and single-process scenarios.
//!
//! Records every published frame together with the channel it went out on,
//! and counts connections and channels so tests can check that every
//! resource acquired by a publish call is released again, error paths
//! included. Failures can be injected to exercise those paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{BrokerChannel, BrokerConnection, Connector, OutgoingFrame};
use crate::error::TransportError;

/// A frame as the broker received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFrame {
    /// Id of the channel the frame was published on.
    pub channel: u64,
    pub frame: OutgoingFrame,
}

/// Resource counters, cumulative over the broker's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResourceCounts {
    pub connections_opened: usize,
    pub connections_closed: usize,
    pub channels_opened: usize,
    pub channels_closed: usize,
    /// Channels still open when their connection was closed.
    pub channels_outlived_connection: usize,
}

impl ResourceCounts {
    /// Every connection and channel opened so far has been closed, in order.
    pub fn all_released(&self) -> bool {
        self.connections_opened == self.connections_closed
            && self.channels_opened == self.channels_closed
            && self.channels_outlived_connection == 0
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    frames: Vec<PublishedFrame>,
    counts: ResourceCounts,
    refuse_connections: bool,
    refuse_channels: bool,
    fail_closes: bool,
    fail_publish_at: Option<usize>,
    publish_attempts: usize,
    next_channel: u64,
}

/// In-memory broker.
///
/// Cheap to clone; clones share the same state, so a test can keep one handle
/// for inspection while the publisher owns another.
///
/// ```
/// use exchange_publisher::InMemoryBroker;
///
/// let broker = InMemoryBroker::new();
/// assert!(broker.frames().is_empty());
/// assert!(broker.counts().all_released());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `connect` fail, as an unreachable broker would.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inspect().refuse_connections = refuse;
    }

    /// Make every subsequent `open_channel` fail.
    pub fn refuse_channels(&self, refuse: bool) {
        self.inspect().refuse_channels = refuse;
    }

    /// Make every subsequent channel and connection close report an error.
    ///
    /// The resource is still torn down and counted as closed, as when the
    /// broker drops the session before answering the close handshake.
    pub fn fail_closes(&self, fail: bool) {
        self.inspect().fail_closes = fail;
    }

    /// Fail the publish attempt with the given zero-based index.
    pub fn fail_publish_at(&self, attempt: usize) {
        self.inspect().fail_publish_at = Some(attempt);
    }

    /// All frames received, in arrival order.
    pub fn frames(&self) -> Vec<PublishedFrame> {
        self.inspect().frames.clone()
    }

    /// Frames received on the given exchange.
    pub fn frames_on(&self, exchange: &str) -> Vec<PublishedFrame> {
        self.inspect()
            .frames
            .iter()
            .filter(|published| published.frame.exchange == exchange)
            .cloned()
            .collect()
    }

    /// Type headers of all received frames, in order.
    pub fn type_headers(&self) -> Vec<String> {
        self.inspect()
            .frames
            .iter()
            .map(|published| published.frame.properties.type_header.clone())
            .collect()
    }

    pub fn counts(&self) -> ResourceCounts {
        self.inspect().counts
    }

    /// Number of publish attempts, failed ones included.
    pub fn publish_attempts(&self) -> usize {
        self.inspect().publish_attempts
    }

    fn inspect(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, BrokerState>, TransportError> {
        self.state
            .lock()
            .map_err(|_| TransportError::LockPoisoned(operation))
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    type Connection = InMemoryConnection;

    async fn connect(&self) -> Result<Self::Connection, TransportError> {
        let mut state = self.lock("connect")?;
        if state.refuse_connections {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        state.counts.connections_opened += 1;

        Ok(InMemoryConnection {
            broker: self.clone(),
            closed: Arc::new(AtomicBool::new(false)),
            open_channels: Arc::new(AtomicUsize::new(0)),
        })
    }
}

pub struct InMemoryConnection {
    broker: InMemoryBroker,
    closed: Arc<AtomicBool>,
    open_channels: Arc<AtomicUsize>,
}

#[async_trait]
impl BrokerConnection for InMemoryConnection {
    type Channel = InMemoryChannel;

    async fn open_channel(&self) -> Result<Self::Channel, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Channel("connection is closed".to_string()));
        }

        let mut state = self.broker.lock("open_channel")?;
        if state.refuse_channels {
            return Err(TransportError::Channel("channel refused".to_string()));
        }
        state.next_channel += 1;
        state.counts.channels_opened += 1;
        self.open_channels.fetch_add(1, Ordering::SeqCst);

        Ok(InMemoryChannel {
            id: state.next_channel,
            broker: self.broker.clone(),
            closed: AtomicBool::new(false),
            connection_closed: Arc::clone(&self.closed),
            open_channels: Arc::clone(&self.open_channels),
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut state = self.broker.lock("close connection")?;
        state.counts.connections_closed += 1;
        state.counts.channels_outlived_connection += self.open_channels.load(Ordering::SeqCst);
        if state.fail_closes {
            return Err(TransportError::Close("connection close not acknowledged".to_string()));
        }
        Ok(())
    }
}

pub struct InMemoryChannel {
    id: u64,
    broker: InMemoryBroker,
    closed: AtomicBool,
    connection_closed: Arc<AtomicBool>,
    open_channels: Arc<AtomicUsize>,
}

impl InMemoryChannel {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    async fn publish(&self, frame: &OutgoingFrame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) || self.connection_closed.load(Ordering::SeqCst) {
            return Err(TransportError::Publish(format!(
                "channel {} is closed",
                self.id
            )));
        }

        let mut state = self.broker.lock("publish")?;
        let attempt = state.publish_attempts;
        state.publish_attempts += 1;
        if state.fail_publish_at == Some(attempt) {
            return Err(TransportError::Publish(format!(
                "broker rejected publish #{attempt}"
            )));
        }

        state.frames.push(PublishedFrame {
            channel: self.id,
            frame: frame.clone(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.open_channels.fetch_sub(1, Ordering::SeqCst);
        let mut state = self.broker.lock("close channel")?;
        state.counts.channels_closed += 1;
        if state.fail_closes {
            return Err(TransportError::Close(format!(
                "channel {} close not acknowledged",
                self.id
            )));
        }
        Ok(())
    }
}
