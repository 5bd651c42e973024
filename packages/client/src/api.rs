//! API Client
//!
//! HTTP client for the chat backend's REST surface: auth, rooms, messages,
//! users and presence. The bearer token is read fresh from the
//! `TokenProvider` on every request, so login/logout elsewhere in the
//! process is picked up immediately.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::TokenProvider;
use crate::models::{AuthResponse, ChatRoom, Message, User};

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub member_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct RoomList {
    rooms: Vec<ChatRoom>,
}

#[derive(Debug, Deserialize)]
struct RoomEnvelope {
    room: ChatRoom,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    data: Message,
}

#[derive(Debug, Deserialize)]
struct UserList {
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct OnlineStatus {
    online_status: HashMap<i64, bool>,
}

#[derive(Debug, Deserialize)]
struct OnlineUsers {
    online_users: Vec<i64>,
}

impl ApiClient {
    /// Create a client for the given API base URL
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("API request failed with status {}: {}", status, body);
        }
        response
            .json()
            .await
            .context("Failed to decode API response")
    }

    /// GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        Self::parse(response).await
    }

    /// POST request
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        Self::parse(response).await
    }

    /// PUT request
    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .authorize(self.client.put(&url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        Self::parse(response).await
    }

    /// DELETE request
    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        Self::parse(response).await
    }

    // Auth

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        self.post("/auth/login", &LoginRequest { email, password })
            .await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse> {
        self.post(
            "/auth/register",
            &RegisterRequest {
                name,
                email,
                password,
            },
        )
        .await
    }

    // Rooms

    pub async fn rooms(&self) -> Result<Vec<ChatRoom>> {
        let list: RoomList = self.get("/chat/rooms").await?;
        Ok(list.rooms)
    }

    pub async fn room(&self, room_id: i64) -> Result<ChatRoom> {
        let envelope: RoomEnvelope = self.get(&format!("/chat/rooms/{}", room_id)).await?;
        Ok(envelope.room)
    }

    pub async fn create_room(&self, request: &CreateRoomRequest) -> Result<ChatRoom> {
        let envelope: RoomEnvelope = self.post("/chat/rooms", request).await?;
        Ok(envelope.room)
    }

    pub async fn create_direct_chat(&self, user_id: i64) -> Result<ChatRoom> {
        let envelope: RoomEnvelope = self
            .post("/chat/direct", &serde_json::json!({ "user_id": user_id }))
            .await?;
        Ok(envelope.room)
    }

    pub async fn add_member(&self, room_id: i64, user_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                &format!("/chat/rooms/{}/members", room_id),
                &serde_json::json!({ "user_id": user_id }),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .delete(&format!("/chat/rooms/{}/members/{}", room_id, user_id))
            .await?;
        Ok(())
    }

    // Messages

    pub async fn messages(&self, room_id: i64, limit: usize, offset: usize) -> Result<Vec<Message>> {
        let list: MessageList = self
            .get(&format!(
                "/chat/rooms/{}/messages?limit={}&offset={}",
                room_id, limit, offset
            ))
            .await?;
        Ok(list.messages)
    }

    pub async fn send_message(&self, room_id: i64, content: &str) -> Result<Message> {
        let sent: SentMessage = self
            .post(
                &format!("/chat/rooms/{}/messages", room_id),
                &serde_json::json!({ "content": content }),
            )
            .await?;
        Ok(sent.data)
    }

    pub async fn mark_read(&self, message_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .put(
                &format!("/chat/messages/{}/read", message_id),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    // Users

    pub async fn users(&self, search: Option<&str>) -> Result<Vec<User>> {
        let path = match search {
            Some(query) => format!("/users?search={}", urlencoding::encode(query)),
            None => "/users".to_string(),
        };
        let list: UserList = self.get(&path).await?;
        Ok(list.users)
    }

    // Presence

    pub async fn send_heartbeat(&self) -> Result<()> {
        let _: serde_json::Value = self
            .post("/presence/heartbeat", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    pub async fn online_status(&self, user_ids: &[i64]) -> Result<HashMap<i64, bool>> {
        let status: OnlineStatus = self
            .post("/presence/status", &serde_json::json!({ "user_ids": user_ids }))
            .await?;
        Ok(status.online_status)
    }

    pub async fn online_users(&self) -> Result<Vec<i64>> {
        let online: OnlineUsers = self.get("/presence/online").await?;
        Ok(online.online_users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenCell;

    #[test]
    fn test_base_url_is_normalized() {
        let tokens = Arc::new(TokenCell::new());
        let api = ApiClient::new("http://localhost:8080/api/", tokens).unwrap();
        assert_eq!(api.base_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_create_room_request_omits_empty_fields() {
        let request = CreateRoomRequest {
            name: "general".into(),
            description: None,
            member_ids: vec![1, 2],
            is_group: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("description"));
        assert!(!json.contains("is_group"));
        assert!(json.contains(r#""member_ids":[1,2]"#));
    }

    #[test]
    fn test_online_status_parses_numeric_keys() {
        let json = r#"{"online_status":{"1":true,"2":false}}"#;
        let status: OnlineStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.online_status.get(&1), Some(&true));
        assert_eq!(status.online_status.get(&2), Some(&false));
    }
}
