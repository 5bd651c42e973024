//! WebSocket Connection Manager
//!
//! Owns at most one live room socket per session, decodes inbound frames onto
//! the shared event stream, and retries unexpected closures with a bounded
//! fixed-delay reconnect policy.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::TokenProvider;
use crate::connection::protocol::{ChatEvent, ClientFrame};
use crate::events::{EventBus, EventStream};
use crate::session::{ConnectionState, SessionManager};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connection manager settings
#[derive(Debug, Clone)]
pub struct SocketSettings {
    /// WebSocket base URL, e.g. `ws://localhost:8080`
    pub ws_base_url: String,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Reconnect attempts before the stream is terminated
    pub max_reconnect_attempts: u32,
    /// Handshake timeout for a single open attempt
    pub connect_timeout: Duration,
}

/// Room WebSocket connection manager.
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct ChatSocket {
    inner: Arc<SocketInner>,
}

struct SocketInner {
    settings: SocketSettings,
    tokens: Arc<dyn TokenProvider>,
    session: SessionManager,
    bus: Arc<EventBus>,
    sink: Mutex<Option<WsSink>>,
    reconnect_cancel: parking_lot::Mutex<CancellationToken>,
}

impl ChatSocket {
    /// Start building a socket for the given WebSocket base URL
    pub fn builder(ws_base_url: &str, tokens: Arc<dyn TokenProvider>) -> ChatSocketBuilder {
        ChatSocketBuilder::new(ws_base_url, tokens)
    }

    /// Connect to a chat room and return the shared event stream.
    ///
    /// Never fails synchronously: precondition failures (missing token) are
    /// logged and yield an inert stream, transport faults are handled by the
    /// reconnect policy. Calling this while already connecting or connected
    /// to the same room is a no-op returning the same stream; a different
    /// room triggers an ordered close-then-open.
    pub fn connect(&self, room_id: i64) -> EventStream {
        let inner = &self.inner;
        let stream = EventStream::new(inner.bus.clone());

        if inner.bus.is_terminated() {
            warn!(room_id, "event stream already terminated, not reconnecting");
            return stream;
        }

        inner.session.set_manually_closed(false);

        let state = inner.session.current_state();
        if inner.session.room_id() == Some(room_id)
            && matches!(state, ConnectionState::Connecting | ConnectionState::Connected)
        {
            debug!(room_id, "already connected to room");
            return stream;
        }

        let Some(token) = inner.tokens.token() else {
            error!(room_id, "no auth token available for websocket connection");
            return stream;
        };

        // A connect supersedes any reconnect timer still pending.
        inner.cancel_pending_reconnect();

        let prev_room = inner.session.room_id();
        let epoch = inner.session.begin_epoch();
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            if prev_room.is_some_and(|prev| prev != room_id) {
                inner.close_transport("switching rooms").await;
            }
            inner.session.set_room(room_id);
            inner.open_socket(room_id, token, epoch).await;
        });

        stream
    }

    /// Send a frame over the open transport.
    ///
    /// Dropped with a diagnostic when the socket is not open; sends are never
    /// buffered while disconnected.
    pub async fn send(&self, frame: &ClientFrame) {
        let inner = &self.inner;

        if !inner.session.is_connected() {
            warn!(state = %inner.session.current_state(), "cannot send, socket not open");
            return;
        }

        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize outbound frame");
                return;
            }
        };

        let mut guard = inner.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => {
                debug!("sending frame");
                if let Err(e) = sink.send(Message::Text(json)).await {
                    warn!(error = %e, "websocket send failed");
                }
            }
            None => warn!("cannot send, no open transport"),
        }
    }

    /// Manually close the connection and tear down session state.
    ///
    /// Idempotent; cancels any pending reconnect timer.
    pub async fn disconnect(&self) {
        let inner = &self.inner;

        inner.session.set_manually_closed(true);
        inner.cancel_pending_reconnect();
        // orphan any live reader so the close below never triggers the policy
        inner.session.begin_epoch();

        inner.close_transport("client disconnect").await;

        inner.session.clear_room();
        inner.session.set_disconnected(Some("client closed".into()));
    }

    /// Check if the transport is open
    pub fn is_connected(&self) -> bool {
        self.inner.session.is_connected()
    }

    /// Current connection readiness
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.session.current_state()
    }

    /// Handle to the shared event stream
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.bus.clone())
    }

    /// The session state owned by this socket
    pub fn session(&self) -> SessionManager {
        self.inner.session.clone()
    }
}

impl SocketInner {
    async fn open_socket(self: &Arc<Self>, room_id: i64, token: String, epoch: u64) {
        let url = format!(
            "{}/chat/rooms/{}/ws?token={}",
            self.settings.ws_base_url.trim_end_matches('/'),
            room_id,
            urlencoding::encode(&token)
        );

        self.session.set_connecting();
        info!(room_id, "connecting to room websocket");

        let connect = timeout(self.settings.connect_timeout, connect_async(&url)).await;
        let ws_stream = match connect {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                error!(room_id, error = %e, "websocket connection failed");
                self.handle_closed(room_id, epoch).await;
                return;
            }
            Err(_) => {
                error!(
                    room_id,
                    timeout_secs = self.settings.connect_timeout.as_secs(),
                    "websocket connection timed out"
                );
                self.handle_closed(room_id, epoch).await;
                return;
            }
        };

        if !self.session.is_current_epoch(epoch) {
            debug!(room_id, "transport superseded during handshake");
            return;
        }

        info!(room_id, "websocket connection established");
        self.session.set_connected();

        let (mut write, read) = ws_stream.split();

        // courtesy notification to the peer
        match ClientFrame::connected(room_id).to_json() {
            Ok(json) => {
                if let Err(e) = write.send(Message::Text(json)).await {
                    warn!(error = %e, "failed to send connected frame");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize connected frame"),
        }

        *self.sink.lock().await = Some(write);

        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.read_loop(read, room_id, epoch).await });
    }

    async fn read_loop(self: Arc<Self>, mut read: WsSource, room_id: i64, epoch: u64) {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => match ChatEvent::from_json(&text) {
                    Ok(event) => {
                        debug!(room_id, "received event");
                        self.bus.publish(event);
                    }
                    Err(e) => warn!(room_id, error = %e, "dropping malformed frame"),
                },
                Ok(Message::Ping(data)) => {
                    debug!("received ping, sending pong");
                    if let Some(sink) = self.sink.lock().await.as_mut() {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                }
                Ok(Message::Pong(_)) => {
                    debug!("received pong");
                }
                Ok(Message::Close(frame)) => {
                    info!(room_id, ?frame, "received close frame");
                    break;
                }
                Ok(Message::Binary(_)) => {
                    debug!("received binary message (ignored)");
                }
                Ok(Message::Frame(_)) => {
                    // Raw frame, typically not used
                }
                Err(e) => {
                    error!(room_id, error = %e, "websocket error");
                    break;
                }
            }
        }

        self.handle_closed(room_id, epoch).await;
    }

    /// Close-side policy: decide between teardown, reconnect and giving up.
    async fn handle_closed(self: &Arc<Self>, room_id: i64, epoch: u64) {
        if !self.session.is_current_epoch(epoch) {
            debug!(room_id, "stale transport closed");
            return;
        }

        self.sink.lock().await.take();

        if self.session.manually_closed() {
            self.session.set_disconnected(Some("client closed".into()));
            return;
        }

        let attempts = self.session.reconnect_attempts();
        if attempts >= self.settings.max_reconnect_attempts {
            error!(room_id, attempts, "max reconnect attempts reached");
            self.bus.fail("connection failed");
            self.session.set_disconnected(Some("reconnect attempts exhausted".into()));
            self.session.clear_room();
            return;
        }

        let attempt = self.session.begin_reconnect();
        warn!(
            room_id,
            attempt,
            max = self.settings.max_reconnect_attempts,
            "reconnecting after unexpected close"
        );

        let cancel = self.reconnect_cancel.lock().clone();
        let delay = self.settings.reconnect_delay;
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(room_id, "pending reconnect cancelled");
                }
                _ = sleep(delay) => {
                    if inner.session.manually_closed() {
                        return;
                    }
                    // Token may have been cleared while waiting; abandon
                    // quietly, a later connect call restarts the cycle.
                    let Some(token) = inner.tokens.token() else {
                        debug!(room_id, "auth token gone, abandoning reconnect");
                        return;
                    };
                    let epoch = inner.session.begin_epoch();
                    inner.open_socket_boxed(room_id, token, epoch).await;
                }
            }
        });
    }

    /// Boxed re-entry into `open_socket` for the reconnect timer task.
    ///
    /// The timer task is constructed inside `handle_closed`, which
    /// `open_socket` awaits on failure; boxing erases the future type and
    /// breaks that cycle so the task stays `Send`-provable.
    fn open_socket_boxed(
        self: Arc<Self>,
        room_id: i64,
        token: String,
        epoch: u64,
    ) -> BoxFuture<'static, ()> {
        Box::pin(async move { self.open_socket(room_id, token, epoch).await })
    }

    /// Perform a normal close on the open transport, if any
    async fn close_transport(&self, reason: &str) {
        let mut guard = self.sink.lock().await;
        if let Some(mut sink) = guard.take() {
            info!(reason, "closing websocket");
            self.session.set_closing();
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: reason.to_string().into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                debug!(error = %e, "close handshake failed");
            }
            self.session.set_disconnected(Some(reason.to_string()));
        }
    }

    fn cancel_pending_reconnect(&self) {
        let mut guard = self.reconnect_cancel.lock();
        std::mem::replace(&mut *guard, CancellationToken::new()).cancel();
    }
}

/// Builder for `ChatSocket`
pub struct ChatSocketBuilder {
    ws_base_url: String,
    tokens: Arc<dyn TokenProvider>,
    session: Option<SessionManager>,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    connect_timeout: Duration,
}

impl ChatSocketBuilder {
    pub fn new(ws_base_url: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            ws_base_url: ws_base_url.to_string(),
            tokens,
            session: None,
            reconnect_delay: Duration::from_millis(2000),
            max_reconnect_attempts: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.reconnect_delay = Duration::from_millis(ms);
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout = Duration::from_secs(secs);
        self
    }

    /// Provide the session state the socket should own
    pub fn session(mut self, session: SessionManager) -> Self {
        self.session = Some(session);
        self
    }

    pub fn build(self) -> ChatSocket {
        ChatSocket {
            inner: Arc::new(SocketInner {
                settings: SocketSettings {
                    ws_base_url: self.ws_base_url,
                    reconnect_delay: self.reconnect_delay,
                    max_reconnect_attempts: self.max_reconnect_attempts,
                    connect_timeout: self.connect_timeout,
                },
                tokens: self.tokens,
                session: self.session.unwrap_or_default(),
                bus: EventBus::new(),
                sink: Mutex::new(None),
                reconnect_cancel: parking_lot::Mutex::new(CancellationToken::new()),
            }),
        }
    }
}
