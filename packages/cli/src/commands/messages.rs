use anyhow::Result;
use colored::Colorize;

use crate::commands::api_client;
use crate::config::Config;

/// Print recent messages from a room, oldest first
pub async fn run(room_id: i64, lines: usize) -> Result<()> {
    let config = Config::load()?;
    config.current_user()?;
    let api = api_client(&config)?;

    let room = api.room(room_id).await?;
    let messages = api.messages(room_id, lines, 0).await?;

    println!(
        "{} {}",
        room.name.bold(),
        format!("(last {} messages)", messages.len()).dimmed()
    );
    println!("{}", "─".repeat(60));

    if messages.is_empty() {
        println!("{}", "No messages yet.".dimmed());
        return Ok(());
    }

    for message in &messages {
        println!(
            "{} {}: {}",
            message
                .created_at
                .format("[%H:%M]")
                .to_string()
                .dimmed(),
            message.sender_name().bold(),
            message.content
        );
    }

    Ok(())
}
