//! Data Models
//!
//! Wire models shared by the HTTP API client and the room WebSocket. Field
//! casing follows the backend's JSON (GORM-style `ID`/`CreatedAt` plus
//! snake_case fields), mapped to Rust names with serde renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered chat user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(rename = "CreatedAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "UpdatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A chat room (group or direct)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    #[serde(rename = "ID")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_group: bool,
    pub creator_id: i64,
    #[serde(default)]
    pub members: Vec<User>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "UpdatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ChatRoom {
    /// A direct chat is a non-group room between exactly two members
    pub fn is_direct(&self) -> bool {
        !self.is_group || self.members.len() == 2
    }

    /// Display name for the room from the given user's perspective.
    ///
    /// Direct chats are titled after the other member.
    pub fn display_name(&self, current_user_id: i64) -> String {
        if self.is_direct() {
            if let Some(other) = self.members.iter().find(|m| m.id != current_user_id) {
                return other.name.clone();
            }
        }
        self.name.clone()
    }
}

/// A message in a chat room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "ID")]
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    #[serde(default)]
    pub sender: Option<User>,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "UpdatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Sender display name, falling back to the numeric id
    pub fn sender_name(&self) -> String {
        self.sender
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_else(|| format!("user {}", self.sender_id))
    }
}

/// Response to login and register requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: User,
}
