use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::chat::{Message, Origin, SessionIdentity};
use crate::constants::DISPLAY_TIME_FORMAT;
use crate::utils::HuddleError;

/// Message envelope exchanged over the streaming connection, both directions
///
/// `message` and `sender` are required; a frame missing either is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub message: String,
    pub sender: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub timestamp: String,
}

impl ChatFrame {
    /// A frame written by `identity`, stamped with the local display time
    pub fn outgoing(text: impl Into<String>, identity: &SessionIdentity) -> Self {
        Self {
            message: text.into(),
            sender: identity.identity.clone(),
            sender_name: identity.display_name.clone(),
            timestamp: Local::now().format(DISPLAY_TIME_FORMAT).to_string(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, HuddleError> {
        serde_json::from_str(text).map_err(|e| HuddleError::MalformedFrame(e.to_string()))
    }

    pub fn encode(&self) -> Result<String, HuddleError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_message(self, origin: Origin) -> Message {
        Message {
            text: self.message,
            sender_identity: self.sender,
            sender_display_name: self.sender_name,
            timestamp: self.timestamp,
            origin,
        }
    }
}
