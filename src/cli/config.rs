//! Configuration CLI command handlers

use secrecy::{ExposeSecret, SecretString};

use crate::cli::commands::ConfigCommand;
use crate::core::config::RepoConfig;
use crate::core::mirror::redact_url;
use crate::error::Result;

/// Handle configuration commands
pub fn handle_config(command: ConfigCommand, config: Result<RepoConfig>) -> Result<()> {
    match command {
        ConfigCommand::Show => handle_show(&config?),
        ConfigCommand::Path => {
            println!("{}", RepoConfig::config_path()?.display());
            Ok(())
        }
    }
}

/// Print the resolved configuration with secrets masked
fn handle_show(config: &RepoConfig) -> Result<()> {
    println!("url:                {}", display_or_unset(&redact_url(&config.url)));
    println!("username:           {}", display_or_unset(&config.username));
    println!("password:           {}", mask_secret(&config.password));
    println!("local_path:         {}", config.local_path.display());
    println!("release:            {}", config.release);
    println!(
        "branch:             {}",
        config.branch.as_deref().unwrap_or("(remote default)")
    );
    println!("allow_empty_commit: {}", config.allow_empty_commit);

    match &config.author {
        Some(author) => println!("author:             {} <{}>", author.name, author.email),
        None => println!("author:             (git config)"),
    }

    if !config.ssh_options.is_empty() {
        println!("ssh_options:");
        for (key, value) in &config.ssh_options {
            println!("  {} = {}", key, value);
        }
    }

    match config.validate() {
        Ok(auth) => println!("auth:               {}", auth.name()),
        Err(e) => println!("auth:               invalid ({})", first_line(&e.to_string())),
    }

    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}

/// Get a masked version of a secret for display (shows first 2 and last 2 chars)
pub fn mask_secret(secret: &SecretString) -> String {
    let exposed = secret.expose_secret();
    let chars: Vec<char> = exposed.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n <= 8 => "*".repeat(n),
        n => format!(
            "{}...{}",
            chars[..2].iter().collect::<String>(),
            chars[n - 2..].iter().collect::<String>()
        ),
    }
}
