use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use parley_client::{ChatEvent, ChatSocket, ClientFrame, PresenceTracker};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::api_client;
use crate::config::{Config, StoredTokens};

/// Join a room: print recent history, then bridge stdin lines and live
/// events until `/quit` or EOF.
pub async fn run(room_id: i64) -> Result<()> {
    let config = Config::load()?;
    let me = config.current_user()?.clone();
    let api = Arc::new(api_client(&config)?);

    let room = api.room(room_id).await?;
    println!(
        "{} {}",
        room.display_name(me.id).bold(),
        "(type /quit to leave)".dimmed()
    );
    println!("{}", "─".repeat(60));

    let history = api.messages(room_id, 50, 0).await?;
    for message in &history {
        print_message(&message.created_at.format("%H:%M").to_string(), &message.sender_name(), &message.content);
    }

    let presence = PresenceTracker::new(api.clone());
    presence.start_heartbeat();

    let tokens = Arc::new(StoredTokens);
    let socket = ChatSocket::builder(config.ws_url(), tokens).build();
    let stream = socket.connect(room_id);
    let mut events = stream.subscribe();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ChatEvent::Message { message }) => {
                    // our own messages come back over the socket too
                    if message.sender_id != me.id {
                        print_message(
                            &message.created_at.format("%H:%M").to_string(),
                            &message.sender_name(),
                            &message.content,
                        );
                        if let Err(e) = api.mark_read(message.id).await {
                            tracing::debug!(error = %e, "could not mark message read");
                        }
                    }
                }
                Ok(ChatEvent::Typing { username, typing, user_id }) => {
                    if typing && user_id != me.id {
                        let name = username.unwrap_or_else(|| format!("user {}", user_id));
                        println!("{}", format!("… {} is typing", name).dimmed());
                    }
                }
                Ok(ChatEvent::Connected { content }) => {
                    if let Some(content) = content {
                        println!("{}", content.dimmed());
                    }
                }
                Ok(ChatEvent::Error { error }) => {
                    eprintln!("{} {}", "server error:".red(), error);
                }
                Err(e) => {
                    eprintln!("{} {}", "✗".red().bold(), e);
                    break;
                }
            },
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) if !line.trim().is_empty() => {
                    socket.send(&ClientFrame::typing(me.id, &me.name, false)).await;
                    if let Err(e) = api.send_message(room_id, line.trim()).await {
                        eprintln!("{} {}", "send failed:".red(), e);
                    }
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    socket.disconnect().await;
    presence.stop_heartbeat();
    println!("{}", "Left the room.".dimmed());

    Ok(())
}

fn print_message(time: &str, sender: &str, content: &str) {
    println!("{} {}: {}", format!("[{}]", time).dimmed(), sender.bold(), content);
}
