//! Parley Client Core
//!
//! This crate provides the client-side core of the Parley chat service:
//! the room WebSocket connection manager with its reconnect policy, the
//! shared replay-latest event stream, the HTTP API client, and presence
//! tracking.

pub mod api;
pub mod auth;
pub mod connection;
pub mod events;
pub mod models;
pub mod presence;
pub mod session;

// Re-exports for convenience
pub use api::{ApiClient, CreateRoomRequest};
pub use auth::{TokenCell, TokenProvider};
pub use connection::protocol::{ChatEvent, ClientFrame};
pub use connection::websocket::{ChatSocket, ChatSocketBuilder, SocketSettings};
pub use events::{EventStream, EventSubscriber, StreamError};
pub use models::{AuthResponse, ChatRoom, Message, User};
pub use presence::{format_last_seen, PresenceTracker};
pub use session::{ConnectionState, SessionManager};
