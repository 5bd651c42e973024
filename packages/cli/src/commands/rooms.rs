use anyhow::Result;
use colored::Colorize;
use parley_client::CreateRoomRequest;

use crate::commands::api_client;
use crate::config::Config;

/// List the current user's rooms
pub async fn list() -> Result<()> {
    let config = Config::load()?;
    let current_user_id = config.current_user()?.id;
    let api = api_client(&config)?;

    let rooms = api.rooms().await?;
    if rooms.is_empty() {
        println!("{}", "No rooms yet. Create one with `parley create-room`.".dimmed());
        return Ok(());
    }

    println!("{}", "Rooms".bold());
    println!("{}", "─".repeat(60));
    println!(
        "  {:<6} {:<28} {:<8} {:>8}",
        "ID".dimmed(),
        "NAME".dimmed(),
        "TYPE".dimmed(),
        "MEMBERS".dimmed(),
    );
    println!("{}", "─".repeat(60));

    for room in &rooms {
        let kind = if room.is_direct() {
            "direct".cyan()
        } else {
            "group".normal()
        };
        println!(
            "  {:<6} {:<28} {:<8} {:>8}",
            room.id,
            room.display_name(current_user_id),
            kind,
            room.members.len()
        );
    }

    Ok(())
}

/// Create a group room
pub async fn create(name: &str, description: Option<String>, members: Vec<i64>) -> Result<()> {
    let config = Config::load()?;
    config.current_user()?;
    let api = api_client(&config)?;

    let request = CreateRoomRequest {
        name: name.to_string(),
        description,
        member_ids: members,
        is_group: Some(true),
    };
    let room = api.create_room(&request).await?;

    println!(
        "{} Created room {} (id {})",
        "✓".green().bold(),
        room.name.bold(),
        room.id
    );
    Ok(())
}

/// Open (or create) a direct chat with another user
pub async fn direct(user_id: i64) -> Result<()> {
    let config = Config::load()?;
    let current_user_id = config.current_user()?.id;
    let api = api_client(&config)?;

    let room = api.create_direct_chat(user_id).await?;

    println!(
        "{} Direct chat with {} ready (room id {})",
        "✓".green().bold(),
        room.display_name(current_user_id).bold(),
        room.id
    );
    println!("  Join it with {}", format!("parley chat {}", room.id).dimmed());
    Ok(())
}

/// Add a member to a room
pub async fn invite(room_id: i64, user_id: i64) -> Result<()> {
    let config = Config::load()?;
    config.current_user()?;
    let api = api_client(&config)?;

    api.add_member(room_id, user_id).await?;
    println!(
        "{} Added user {} to room {}",
        "✓".green().bold(),
        user_id,
        room_id
    );
    Ok(())
}

/// Remove a member from a room
pub async fn kick(room_id: i64, user_id: i64) -> Result<()> {
    let config = Config::load()?;
    config.current_user()?;
    let api = api_client(&config)?;

    api.remove_member(room_id, user_id).await?;
    println!(
        "{} Removed user {} from room {}",
        "✓".green().bold(),
        user_id,
        room_id
    );
    Ok(())
}
