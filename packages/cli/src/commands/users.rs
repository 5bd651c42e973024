use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use parley_client::{format_last_seen, PresenceTracker};

use crate::commands::api_client;
use crate::config::Config;

/// List users, optionally filtered by a search query
pub async fn list(search: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    config.current_user()?;
    let api = Arc::new(api_client(&config)?);

    let users = api.users(search).await?;
    if users.is_empty() {
        println!("{}", "No users found.".dimmed());
        return Ok(());
    }

    // presence is fresher than the is_online flag on the user records
    let presence = PresenceTracker::new(api.clone());
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    if let Err(e) = presence.refresh(&ids).await {
        tracing::warn!(error = %e, "could not refresh presence, falling back to user flags");
        for user in &users {
            presence.set_online(user.id, user.is_online.unwrap_or(false));
        }
    }

    println!("{}", "Users".bold());
    println!("{}", "─".repeat(70));
    println!(
        "  {:<6} {:<20} {:<26} {:<16}",
        "ID".dimmed(),
        "NAME".dimmed(),
        "EMAIL".dimmed(),
        "STATUS".dimmed(),
    );
    println!("{}", "─".repeat(70));

    for user in &users {
        let status = if presence.is_online(user.id) {
            "online".green().to_string()
        } else {
            format_last_seen(user.last_seen_at).dimmed().to_string()
        };
        println!(
            "  {:<6} {:<20} {:<26} {:<16}",
            user.id, user.name, user.email, status
        );
    }

    Ok(())
}
