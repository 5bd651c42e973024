use anyhow::Result;
use colored::Colorize;

use crate::commands::api_client;
use crate::config::Config;

/// Show which users are currently online
pub async fn run() -> Result<()> {
    let config = Config::load()?;
    config.current_user()?;
    let api = api_client(&config)?;

    let online_ids = api.online_users().await?;
    let users = api.users(None).await?;

    println!("{}", "Presence".bold());
    println!("{}", "─".repeat(50));

    let mut online_count = 0;
    for user in &users {
        if online_ids.contains(&user.id) {
            println!("  {} {} ({})", "●".green(), user.name, user.email.dimmed());
            online_count += 1;
        }
    }

    if online_count == 0 {
        println!("{}", "Nobody is online right now.".dimmed());
    } else {
        println!("{}", "─".repeat(50));
        println!(
            "  {} of {} users online",
            online_count.to_string().bold(),
            users.len()
        );
    }

    Ok(())
}
