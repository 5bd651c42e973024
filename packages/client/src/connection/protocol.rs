//! Message Protocol
//!
//! Defines the frame types exchanged with the chat backend over the room
//! WebSocket. Frames are JSON objects with a lowercase `type` discriminator.

use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Events received from the chat backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    /// A fully formed chat message broadcast to the room
    Message { message: Message },

    /// A member started or stopped typing
    Typing {
        #[serde(rename = "userId")]
        user_id: i64,
        #[serde(default)]
        username: Option<String>,
        typing: bool,
    },

    /// Courtesy notification that a peer joined the room socket
    Connected {
        #[serde(default)]
        content: Option<String>,
    },

    /// Error reported by the backend
    Error { error: String },
}

/// Frames sent from the client to the chat backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Courtesy notification sent right after the socket opens
    Connected { content: String },

    /// Typing indicator for the current user
    Typing {
        #[serde(rename = "userId")]
        user_id: i64,
        username: String,
        typing: bool,
    },

    /// Inline message content (rooms that accept messages over the socket)
    Message { content: String },
}

impl ClientFrame {
    /// Create the courtesy frame announced to the peer on open
    pub fn connected(room_id: i64) -> Self {
        ClientFrame::Connected {
            content: format!("User connected to room {}", room_id),
        }
    }

    /// Create a typing indicator frame
    pub fn typing(user_id: i64, username: &str, typing: bool) -> Self {
        ClientFrame::Typing {
            user_id,
            username: username.to_string(),
            typing,
        }
    }

    /// Serialize the frame to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ChatEvent {
    /// Deserialize an event from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
