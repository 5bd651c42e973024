//! Connection module
//!
//! Everything that talks to the chat backend over the room WebSocket:
//! the frame protocol and the connection manager with its reconnect policy.

pub mod protocol;
pub mod websocket;
