//! Presence
//!
//! Heartbeat loop announcing this client to the backend every 30 seconds,
//! plus a local cache of who is online. Heartbeat failures are logged and
//! absorbed; the loop keeps ticking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ApiClient;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Presence heartbeat and online-status cache
#[derive(Clone)]
pub struct PresenceTracker {
    api: Arc<ApiClient>,
    interval: Duration,
    heartbeat: Arc<Mutex<Option<CancellationToken>>>,
    online: Arc<RwLock<HashMap<i64, bool>>>,
}

impl PresenceTracker {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self::with_interval(api, HEARTBEAT_INTERVAL)
    }

    pub fn with_interval(api: Arc<ApiClient>, interval: Duration) -> Self {
        Self {
            api,
            interval,
            heartbeat: Arc::new(Mutex::new(None)),
            online: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start the heartbeat loop. No-op if already running.
    ///
    /// The first heartbeat is sent immediately.
    pub fn start_heartbeat(&self) {
        let mut guard = self.heartbeat.lock();
        if guard.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        *guard = Some(cancel.clone());

        let tracker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tracker.interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("heartbeat loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match tracker.api.send_heartbeat().await {
                            Ok(()) => debug!("heartbeat sent"),
                            Err(e) => warn!(error = %e, "heartbeat failed"),
                        }
                    }
                }
            }
        });

        info!("presence heartbeat started");
    }

    /// Stop the heartbeat loop. Safe to call when not running.
    pub fn stop_heartbeat(&self) {
        if let Some(cancel) = self.heartbeat.lock().take() {
            cancel.cancel();
            info!("presence heartbeat stopped");
        }
    }

    /// Fetch online status for the given users and merge it into the cache
    pub async fn refresh(&self, user_ids: &[i64]) -> anyhow::Result<()> {
        let status = self.api.online_status(user_ids).await?;
        let mut cache = self.online.write();
        for (user_id, online) in status {
            cache.insert(user_id, online);
        }
        Ok(())
    }

    /// Update the cached status for one user
    pub fn set_online(&self, user_id: i64, online: bool) {
        self.online.write().insert(user_id, online);
    }

    /// Cached online status; users never seen are offline
    pub fn is_online(&self, user_id: i64) -> bool {
        self.online.read().get(&user_id).copied().unwrap_or(false)
    }
}

/// Humanize a last-seen timestamp
pub fn format_last_seen(last_seen: Option<DateTime<Utc>>) -> String {
    let Some(seen) = last_seen else {
        return "Never".to_string();
    };

    let elapsed = Utc::now() - seen;
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours < 24 {
        format!("{} hours ago", hours)
    } else if days < 7 {
        format!("{} days ago", days)
    } else {
        seen.format("%Y-%m-%d").to_string()
    }
}
