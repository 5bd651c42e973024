//! CLI Configuration
//!
//! Session state stored in ~/.parley/config.toml: server URLs, the auth
//! token and the logged-in user. `StoredTokens` re-reads the file on every
//! token access so the connection manager always sees the current
//! credential.

use anyhow::{Context, Result};
use parley_client::{TokenProvider, User};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub token: Option<String>,
    pub user: Option<User>,
}

impl Config {
    /// Get the config file path (~/.parley/config.toml)
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".parley").join("config.toml"))
    }

    /// Load config from disk
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get API base URL
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or("http://localhost:8080/api")
    }

    /// Get WebSocket base URL
    pub fn ws_url(&self) -> &str {
        self.ws_url.as_deref().unwrap_or("ws://localhost:8080")
    }

    /// The logged-in user, or an error telling the reader what to do
    pub fn current_user(&self) -> Result<&User> {
        self.user
            .as_ref()
            .context("Not logged in. Run `parley login` first.")
    }
}

/// Token provider backed by the config file.
///
/// Every read goes back to disk, so a token refreshed or removed by another
/// command (or a concurrent `parley logout`) takes effect on the very next
/// connection attempt.
pub struct StoredTokens;

impl TokenProvider for StoredTokens {
    fn token(&self) -> Option<String> {
        Config::load().ok().and_then(|config| config.token)
    }
}
