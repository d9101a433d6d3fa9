use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::constants::DISPLAY_TIME_FORMAT;

/// Where a message entered the log from
///
/// Only used to sequence reconciliation; never shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    History,
    Live,
}

/// A single chat message as kept in the message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender_identity: String,
    pub sender_display_name: String,
    pub timestamp: String,
    pub origin: Origin,
}

impl Message {
    pub fn new(
        text: impl Into<String>,
        sender_identity: impl Into<String>,
        sender_display_name: impl Into<String>,
        timestamp: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            text: text.into(),
            sender_identity: sender_identity.into(),
            sender_display_name: sender_display_name.into(),
            timestamp: timestamp.into(),
            origin,
        }
    }

    /// Whether this message was written by the given identity
    pub fn is_from(&self, identity: &str) -> bool {
        self.sender_identity == identity
    }

    /// Time of the message formatted for display
    ///
    /// History records carry RFC 3339 timestamps and are shown in local time,
    /// matching the stamp on live frames. Those already carry a display string
    /// and pass through untouched.
    pub fn display_time(&self) -> String {
        match DateTime::parse_from_rfc3339(&self.timestamp) {
            Ok(parsed) => parsed
                .with_timezone(&Local)
                .format(DISPLAY_TIME_FORMAT)
                .to_string(),
            Err(_) => self.timestamp.clone(),
        }
    }
}

/// The signed-in user, passed explicitly to everything that needs it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub identity: String,
    pub display_name: String,
}

impl SessionIdentity {
    pub fn new(identity: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
        }
    }
}
