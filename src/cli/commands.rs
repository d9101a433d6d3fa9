use anyhow::{Context, Result};
use colored::Colorize;
use std::time::Duration;

use crate::{
    api::ChatApi,
    app::{get_config_dir, init_config, load_config, AppState, Config},
    chat::{ContactView, ConversationTarget, HistoryLoader},
    constants::STATUS_CHECK_TIMEOUT_MS,
    runtime::{render_contact, render_message},
    utils::HuddleError,
};

use super::{Cli, Commands};

/// Handle CLI subcommands; `false` means continue to the chat console
pub async fn handle_command(command: &Commands, cli: &Cli) -> Result<bool> {
    match command {
        Commands::Init => {
            println!("Initializing Huddle configuration...");
            let path = init_config()?;
            println!("Edit {} to set your identity and credentials.", path.display());
            Ok(true)
        }
        Commands::Version => {
            show_version();
            Ok(true)
        }
        Commands::Status => {
            show_status(&resolve_config(cli)?).await;
            Ok(true)
        }
        Commands::Contacts => {
            list_contacts(&resolve_config(cli)?).await?;
            Ok(true)
        }
        Commands::History => {
            let target = initial_target(cli)
                .ok_or(HuddleError::NoTarget)
                .context("history needs --direct or --group")?;
            print_history(&resolve_config(cli)?, &target).await?;
            Ok(true)
        }
        Commands::Chat => Ok(false),
    }
}

/// Configuration with command-line overrides applied
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(server) = &cli.server {
        config.server.api_url = server.clone();
    }
    Ok(config)
}

/// Target named by `--direct` / `--group`, if any
pub fn initial_target(cli: &Cli) -> Option<ConversationTarget> {
    match (&cli.direct, &cli.group) {
        (Some(identity), _) => Some(ConversationTarget::direct(identity.as_str(), identity.as_str())),
        (None, Some(group)) => Some(ConversationTarget::group(group.as_str())),
        (None, None) => None,
    }
}

/// Show version information
pub fn show_version() {
    println!("Huddle v{}", env!("CARGO_PKG_VERSION"));
    println!("   Terminal client for direct and group chat");
}

async fn list_contacts(config: &Config) -> Result<()> {
    let state = AppState::new(config.clone())?;
    let contacts = state.api.contacts().await.context("Failed to fetch contacts")?;

    if contacts.is_empty() {
        println!("No contacts.");
        return Ok(());
    }
    for summary in contacts {
        println!(
            "{}",
            render_contact(&ContactView {
                summary,
                selected: false,
            })
        );
    }
    Ok(())
}

async fn print_history(config: &Config, target: &ConversationTarget) -> Result<()> {
    let state = AppState::new(config.clone())?;
    let identity = config.session_identity()?;
    let loader = HistoryLoader::new(state.api.clone(), identity.clone());

    println!("{}", target.to_string().bold());
    let messages = loader.load(target).await;
    if messages.is_empty() {
        println!("{}", "(no messages)".dimmed());
    }
    for message in &messages {
        println!("{}", render_message(message, &identity.identity));
    }
    Ok(())
}

/// Show server reachability and configuration
async fn show_status(config: &Config) {
    println!("Huddle Status:");
    println!();

    match config.api_url() {
        Ok(url) => {
            let reachable = match reqwest::Client::builder()
                .timeout(Duration::from_millis(STATUS_CHECK_TIMEOUT_MS))
                .build()
            {
                Ok(client) => client.get(url.clone()).send().await.is_ok(),
                Err(_) => false,
            };
            if reachable {
                println!("  [OK] Server: {}", url.as_str().green());
            } else {
                println!("  [ERROR] Server: {} (unreachable)", url.as_str().red());
            }
        }
        Err(e) => println!("  [ERROR] Server: {}", e),
    }

    match config.ws_url() {
        Ok(url) => println!("  [OK] Streaming: {}", url),
        Err(e) => println!("  [ERROR] Streaming: {}", e),
    }

    match config.session_identity() {
        Ok(identity) => println!("  [OK] Identity: {} <{}>", identity.display_name, identity.identity),
        Err(_) => println!("  [WARNING] Identity: not set"),
    }

    if config.auth.access_token.is_some() {
        println!("  [OK] Credentials: access token present");
    } else {
        println!("  [WARNING] Credentials: no access token");
    }

    if let Ok(dir) = get_config_dir() {
        let config_path = dir.join("config.toml");
        if config_path.exists() {
            println!("  [OK] Configuration: {}", config_path.display());
        } else {
            println!("  [WARNING] Configuration: Not found (using defaults)");
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::TargetKind;
    use clap::Parser;

    #[test]
    fn test_initial_target_from_flags() {
        let cli = Cli::try_parse_from(["huddle", "--group", "Night Owls"]).unwrap();
        let target = initial_target(&cli).unwrap();
        assert_eq!(target.kind(), TargetKind::Group);
        assert_eq!(target.identifier(), "Night Owls");

        let cli = Cli::try_parse_from(["huddle", "--direct", "bob@example.com"]).unwrap();
        assert!(initial_target(&cli).unwrap().is_direct_with("bob@example.com"));

        let cli = Cli::try_parse_from(["huddle"]).unwrap();
        assert!(initial_target(&cli).is_none());
    }

    #[test]
    fn test_server_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\napi_url = \"http://config.example.com\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "huddle",
            "--config",
            path.to_str().unwrap(),
            "--server",
            "http://flag.example.com",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.api_url().unwrap().as_str(), "http://flag.example.com/");
    }
}
