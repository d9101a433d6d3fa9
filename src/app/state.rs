use anyhow::{Context, Result};
use std::sync::Arc;

use crate::api::ApiClient;
use crate::app::Config;
use crate::chat::{SessionManager, SessionSettings};
use crate::transport::WebSocketTransport;

/// Wiring shared by the interactive console and the one-shot commands
pub struct AppState {
    pub config: Config,
    pub api: Arc<ApiClient>,
}

impl AppState {
    /// Build the credential-bearing client from configuration
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::new(
            config.api_url()?,
            &config.server.refresh_path,
            &config.credentials(),
        )
        .context("Failed to create API client")?;

        Ok(Self {
            config,
            api: Arc::new(api),
        })
    }

    /// Start a live session over WebSocket for the configured identity
    pub fn start_session(&self) -> Result<SessionManager> {
        let identity = self.config.session_identity()?;
        let settings = SessionSettings {
            connection_base: self.config.ws_url()?,
            contact_poll_interval: self.config.poll_interval(),
        };
        let transport = WebSocketTransport::with_credentials(self.api.clone());

        Ok(SessionManager::start(
            identity,
            settings,
            self.api.clone(),
            Arc::new(transport),
        ))
    }
}
