//! Session State Management
//!
//! Owns the per-tab chat session: which room the socket belongs to, whether
//! the close was operator-initiated, the reconnect attempt counter, and the
//! connection state machine. The `ChatSocket` is the only mutator; UI code
//! reads projections through it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Connection readiness of the room socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; also the terminal state after teardown
    Disconnected,
    /// Transport handshake in progress
    Connecting,
    /// Transport open and usable
    Connected,
    /// Waiting out the delay before another open attempt
    Reconnecting,
    /// Normal close requested, handshake in flight
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Reconnecting => write!(f, "Reconnecting"),
            ConnectionState::Closing => write!(f, "Closing"),
        }
    }
}

/// State transition information
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

struct SessionInner {
    state: ConnectionState,
    room_id: Option<i64>,
    manually_closed: bool,
    reconnect_attempts: u32,
    epoch: u64,
    last_connected: Option<DateTime<Utc>>,
    transitions: Vec<StateTransition>,
}

/// Thread-safe session state manager
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<RwLock<SessionInner>>,
}

impl SessionManager {
    /// Create a new session starting in Disconnected state
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner {
                state: ConnectionState::Disconnected,
                room_id: None,
                manually_closed: false,
                reconnect_attempts: 0,
                epoch: 0,
                last_connected: None,
                transitions: Vec::new(),
            })),
        }
    }

    /// Get the current connection state
    pub fn current_state(&self) -> ConnectionState {
        self.inner.read().state
    }

    /// Room the session is (or was last) attached to
    pub fn room_id(&self) -> Option<i64> {
        self.inner.read().room_id
    }

    pub(crate) fn set_room(&self, room_id: i64) {
        self.inner.write().room_id = Some(room_id);
    }

    pub(crate) fn clear_room(&self) {
        self.inner.write().room_id = None;
    }

    /// Whether the last close was operator-initiated
    pub fn manually_closed(&self) -> bool {
        self.inner.read().manually_closed
    }

    pub(crate) fn set_manually_closed(&self, closed: bool) {
        self.inner.write().manually_closed = closed;
    }

    /// Reconnect attempts since the last confirmed open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.read().reconnect_attempts
    }

    /// Record one more reconnect attempt and move to Reconnecting.
    ///
    /// Returns the new attempt number.
    pub(crate) fn begin_reconnect(&self) -> u32 {
        self.transition_to(ConnectionState::Reconnecting, Some("connection lost".into()));
        let mut inner = self.inner.write();
        inner.reconnect_attempts += 1;
        inner.reconnect_attempts
    }

    /// Start a new transport generation, superseding any live reader.
    ///
    /// A reader whose epoch is stale must not run the close-side policy;
    /// this is how a room switch orphans the old socket.
    pub(crate) fn begin_epoch(&self) -> u64 {
        let mut inner = self.inner.write();
        inner.epoch += 1;
        inner.epoch
    }

    pub(crate) fn is_current_epoch(&self, epoch: u64) -> bool {
        self.inner.read().epoch == epoch
    }

    /// Timestamp of the last confirmed open
    pub fn last_connected(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_connected
    }

    /// Transition to a new state
    pub(crate) fn transition_to(&self, new_state: ConnectionState, reason: Option<String>) -> bool {
        let mut inner = self.inner.write();

        if !Self::is_valid_transition(inner.state, new_state) {
            return false;
        }

        let transition = StateTransition {
            from: inner.state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        };

        let old_state = inner.state;
        inner.state = new_state;

        // The attempt counter resets only on a confirmed open; the close-side
        // policy never resets it itself.
        if new_state == ConnectionState::Connected {
            inner.last_connected = Some(Utc::now());
            inner.reconnect_attempts = 0;
        }

        inner.transitions.push(transition);
        if inner.transitions.len() > 100 {
            inner.transitions.remove(0);
        }

        tracing::debug!(
            from = %old_state,
            to = %new_state,
            attempts = inner.reconnect_attempts,
            "session state transition"
        );

        true
    }

    fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
        if from == to {
            return true;
        }

        use ConnectionState::*;
        matches!(
            (from, to),
            // From Disconnected
            (Disconnected, Connecting) |
            // From Connecting
            (Connecting, Connected) |
            (Connecting, Disconnected) |
            (Connecting, Reconnecting) |
            (Connecting, Closing) |
            // From Connected
            (Connected, Disconnected) |
            (Connected, Reconnecting) |
            (Connected, Closing) |
            // From Reconnecting
            (Reconnecting, Connecting) |
            (Reconnecting, Connected) |
            (Reconnecting, Disconnected) |
            (Reconnecting, Closing) |
            // From Closing
            (Closing, Disconnected) |
            (Closing, Connecting)
        )
    }

    pub(crate) fn set_connecting(&self) {
        self.transition_to(ConnectionState::Connecting, Some("opening transport".into()));
    }

    pub(crate) fn set_connected(&self) {
        self.transition_to(ConnectionState::Connected, Some("transport open".into()));
    }

    pub(crate) fn set_closing(&self) {
        self.transition_to(ConnectionState::Closing, Some("normal close requested".into()));
    }

    pub(crate) fn set_disconnected(&self, reason: Option<String>) {
        self.transition_to(ConnectionState::Disconnected, reason);
    }

    /// Get recent state transitions, newest first
    pub fn recent_transitions(&self, count: usize) -> Vec<StateTransition> {
        let inner = self.inner.read();
        inner.transitions.iter().rev().take(count).cloned().collect()
    }

    /// Check if the session has an open transport
    pub fn is_connected(&self) -> bool {
        self.current_state() == ConnectionState::Connected
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
