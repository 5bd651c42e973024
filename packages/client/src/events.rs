//! Event Stream
//!
//! Multicast, replay-latest-one stream of decoded chat events. Built on a
//! tokio broadcast channel plus a last-value cache: a new subscriber first
//! receives the most recently published event, then live ones. Once the
//! stream is terminated (reconnect attempts exhausted) every current and
//! future subscriber observes the terminal error and nothing further is
//! published.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::connection::protocol::ChatEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Terminal error observed by stream subscribers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The connection manager gave up reconnecting
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

#[derive(Clone)]
enum StreamItem {
    Event(ChatEvent),
    Failed(String),
}

/// Shared publish side of the stream. One per `ChatSocket`.
pub(crate) struct EventBus {
    tx: broadcast::Sender<StreamItem>,
    latest: RwLock<Option<ChatEvent>>,
    terminal: RwLock<Option<String>>,
}

impl EventBus {
    pub(crate) fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            tx,
            latest: RwLock::new(None),
            terminal: RwLock::new(None),
        })
    }

    /// Publish a decoded event to all subscribers and cache it for replay
    pub(crate) fn publish(&self, event: ChatEvent) {
        if self.terminal.read().is_some() {
            debug!("dropping event published after stream termination");
            return;
        }
        *self.latest.write() = Some(event.clone());
        // send only fails when there are no subscribers; the cache still
        // serves late ones
        let _ = self.tx.send(StreamItem::Event(event));
    }

    /// Terminate the stream. Later publishes are ignored.
    pub(crate) fn fail(&self, reason: &str) {
        let mut terminal = self.terminal.write();
        if terminal.is_some() {
            return;
        }
        *terminal = Some(reason.to_string());
        let _ = self.tx.send(StreamItem::Failed(reason.to_string()));
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminal.read().is_some()
    }
}

/// Handle to the shared event stream returned by `ChatSocket::connect`
#[derive(Clone)]
pub struct EventStream {
    bus: Arc<EventBus>,
}

impl EventStream {
    pub(crate) fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Subscribe to the stream.
    ///
    /// The subscriber immediately replays the most recent event, if any.
    pub fn subscribe(&self) -> EventSubscriber {
        // Join the channel before snapshotting the caches: an event published
        // in between is then seen live rather than lost.
        let rx = self.bus.tx.subscribe();
        EventSubscriber {
            replay: self.bus.latest.read().clone(),
            terminated: self.bus.terminal.read().clone(),
            rx,
        }
    }
}

/// Receiving side of the event stream
pub struct EventSubscriber {
    replay: Option<ChatEvent>,
    terminated: Option<String>,
    rx: broadcast::Receiver<StreamItem>,
}

impl EventSubscriber {
    /// Receive the next event.
    ///
    /// Returns `Err(StreamError::ConnectionFailed)` once the stream has
    /// terminated; the error repeats on every later call.
    pub async fn recv(&mut self) -> Result<ChatEvent, StreamError> {
        if let Some(event) = self.replay.take() {
            return Ok(event);
        }
        if let Some(reason) = &self.terminated {
            return Err(StreamError::ConnectionFailed(reason.clone()));
        }

        loop {
            match self.rx.recv().await {
                Ok(StreamItem::Event(event)) => return Ok(event),
                Ok(StreamItem::Failed(reason)) => {
                    self.terminated = Some(reason.clone());
                    return Err(StreamError::ConnectionFailed(reason));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    // The bus outlives every subscriber; treat a closed
                    // channel as termination anyway.
                    self.terminated = Some("event stream closed".to_string());
                    return Err(StreamError::ConnectionFailed(
                        "event stream closed".to_string(),
                    ));
                }
            }
        }
    }
}
