//! Auth Token Access
//!
//! The connection manager and the API client never own credentials; they read
//! the current token through the `TokenProvider` seam whenever one is needed,
//! so a token refreshed (or removed) elsewhere is picked up on the next use.

use parking_lot::RwLock;

/// Synchronous "current token or absent" read.
pub trait TokenProvider: Send + Sync {
    /// Return the current bearer token, if any
    fn token(&self) -> Option<String>;
}

/// In-memory token cell.
///
/// Used when the embedding application manages credentials itself (and by the
/// test suite); CLI-style frontends typically provide a store backed by their
/// config file instead.
#[derive(Default)]
pub struct TokenCell {
    token: RwLock<Option<String>>,
}

impl TokenCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let cell = Self::new();
        cell.set(token);
        cell
    }

    /// Store a token
    pub fn set(&self, token: &str) {
        *self.token.write() = Some(token.to_string());
    }

    /// Remove the stored token
    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl TokenProvider for TokenCell {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }
}
