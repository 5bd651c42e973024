pub mod auth;
pub mod chat;
pub mod messages;
pub mod rooms;
pub mod status;
pub mod users;

use std::sync::Arc;

use anyhow::Result;
use parley_client::ApiClient;

use crate::config::{Config, StoredTokens};

/// Build an API client from the saved config
pub fn api_client(config: &Config) -> Result<ApiClient> {
    ApiClient::new(config.api_url(), Arc::new(StoredTokens))
}
