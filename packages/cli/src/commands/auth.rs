use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::{Input, Password};

use crate::commands::api_client;
use crate::config::Config;

/// Handle the login command
pub async fn login(api_url: Option<String>, ws_url: Option<String>) -> Result<()> {
    println!("{}", "Parley Login".bold());
    println!();

    let mut config = Config::load().unwrap_or_default();
    if let Some(url) = api_url {
        config.api_url = Some(url);
    }
    if let Some(url) = ws_url {
        config.ws_url = Some(url);
    }

    let email: String = Input::new().with_prompt("Email").interact_text()?;
    let password: String = Password::new().with_prompt("Password").interact()?;

    if email.is_empty() || password.is_empty() {
        bail!("Email and password cannot be empty");
    }

    let api = api_client(&config)?;
    let response = api.login(&email, &password).await?;

    config.token = Some(response.token);
    config.user = Some(response.user.clone());
    config.save()?;

    println!();
    println!(
        "{} Logged in as {} ({})",
        "✓".green().bold(),
        response.user.name.bold(),
        response.user.email
    );
    println!(
        "  Config saved to {}",
        Config::path()?.display().to_string().dimmed()
    );

    Ok(())
}

/// Handle the register command
pub async fn register() -> Result<()> {
    println!("{}", "Parley Registration".bold());
    println!();

    let mut config = Config::load().unwrap_or_default();

    let name: String = Input::new().with_prompt("Name").interact_text()?;
    let email: String = Input::new().with_prompt("Email").interact_text()?;
    let password: String = Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    if name.is_empty() || email.is_empty() || password.is_empty() {
        bail!("Name, email and password cannot be empty");
    }

    let api = api_client(&config)?;
    let response = api.register(&name, &email, &password).await?;

    config.token = Some(response.token);
    config.user = Some(response.user.clone());
    config.save()?;

    println!();
    println!(
        "{} Account created, logged in as {}",
        "✓".green().bold(),
        response.user.name.bold()
    );

    Ok(())
}

/// Handle the logout command
pub fn logout() -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.token = None;
    config.user = None;
    config.save()?;

    println!("{} Logged out", "✓".green().bold());
    Ok(())
}
