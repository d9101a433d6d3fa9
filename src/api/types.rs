use serde::{Deserialize, Serialize};

/// One prior message as returned by the history endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub message: String,
    pub sender: String,
    #[serde(default)]
    pub sender_name: String,
    pub timestamp: String,
}

/// Cookie credentials handed to the client; issuing them happens elsewhere
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}
