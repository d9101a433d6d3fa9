use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::Credentials;
use crate::chat::SessionIdentity;
use crate::constants::{
    CONTACT_POLL_INTERVAL_SECS, DEFAULT_API_URL, DEFAULT_REFRESH_PATH, WS_ROOT_SEGMENT,
};
use crate::utils::HuddleError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat server endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Credential cookies
    #[serde(default)]
    pub auth: AuthConfig,

    /// Who is signed in
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Contact list refresh
    #[serde(default)]
    pub contacts: ContactsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST root, e.g. `http://localhost:8000`
    pub api_url: String,
    /// Streaming root; derived from `api_url` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    /// Credential renewal endpoint, relative to `api_url`
    pub refresh_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactsConfig {
    pub poll_interval_secs: u64,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: CONTACT_POLL_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// REST base URL, always ending in `/`
    pub fn api_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server.api_url)
            .with_context(|| format!("Invalid server.api_url: {}", self.server.api_url))?;
        Ok(with_trailing_slash(url))
    }

    /// Streaming base URL, explicit or derived as `<api_url with ws scheme>/ws/`
    pub fn ws_url(&self) -> Result<Url> {
        if let Some(explicit) = &self.server.ws_url {
            let url = Url::parse(explicit)
                .with_context(|| format!("Invalid server.ws_url: {}", explicit))?;
            return Ok(with_trailing_slash(url));
        }

        let mut url = self.api_url()?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => return Err(anyhow!("Cannot derive a streaming URL from scheme '{}'", other)),
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("Cannot switch {} to {}", url, scheme))?;
        url.join(&format!("{}/", WS_ROOT_SEGMENT))
            .context("Failed to derive streaming URL")
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            access_token: self.auth.access_token.clone(),
            refresh_token: self.auth.refresh_token.clone(),
        }
    }

    /// The signed-in user; the display name falls back to the email
    pub fn session_identity(&self) -> Result<SessionIdentity> {
        let email = self.identity.email.trim();
        if email.is_empty() {
            return Err(HuddleError::ConfigError(
                "identity.email is not set (run `huddle init` and edit the config, or set HUDDLE_IDENTITY__EMAIL)"
                    .to_string(),
            )
            .into());
        }
        let name = match self.identity.name.trim() {
            "" => email,
            name => name,
        };
        Ok(SessionIdentity::new(email, name))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.contacts.poll_interval_secs.max(1))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Load configuration from multiple sources
///
/// An explicit path replaces the global and local files; environment
/// variables still apply on top.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let global_config = get_config_dir()?.join("config.toml");
            let local_config = PathBuf::from(".huddle/config.toml");

            if global_config.exists() {
                figment = figment.merge(Toml::file(&global_config));
            }
            if local_config.exists() {
                figment = figment.merge(Toml::file(&local_config));
            }
        }
    }

    // HUDDLE_SERVER__API_URL -> server.api_url
    figment = figment.merge(Env::prefixed("HUDDLE_").split("__"));

    figment
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "huddle") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("huddle");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
///
/// Returns the path of the global config file.
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
        println!("Created default configuration at: {}", config_file.display());
    }

    let local_example = PathBuf::from(".huddle/config.toml.example");
    if !local_example.exists() {
        if let Some(parent) = local_example.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let example_config = r#"# Huddle project configuration
# Overrides the global settings when run from this directory

[server]
api_url = "http://localhost:8000"
refresh_path = "accounts/refresh"

[identity]
email = "me@example.com"
name = "Me"

[contacts]
poll_interval_secs = 10
"#;
        std::fs::write(&local_example, example_config)?;
        println!("Created example configuration at: {}", local_example.display());
    }

    Ok(config_file)
}
