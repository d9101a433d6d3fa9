use thiserror::Error;

/// Main error type for Huddle
#[derive(Error, Debug)]
pub enum HuddleError {
    #[error("Not connected: no live connection for the active conversation")]
    NotConnected,

    #[error("Cannot send an empty message")]
    EmptyMessage,

    #[error("No conversation selected")]
    NoTarget,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Unauthorized: credential renewal did not help")]
    Unauthorized,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for HuddleError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::TransportError(err.to_string())
    }
}

