use chrono::DateTime;
use std::sync::Arc;
use tracing::{debug, warn};

use super::message::{Message, Origin, SessionIdentity};
use super::target::ConversationTarget;
use crate::api::{ChatApi, HistoryRecord};

/// Fetches prior messages for a target
pub struct HistoryLoader {
    api: Arc<dyn ChatApi>,
    identity: SessionIdentity,
}

impl HistoryLoader {
    pub fn new(api: Arc<dyn ChatApi>, identity: SessionIdentity) -> Self {
        Self { api, identity }
    }

    /// Load the ordered history of `target`
    ///
    /// Any failure yields an empty history rather than an error.
    pub async fn load(&self, target: &ConversationTarget) -> Vec<Message> {
        match self.api.history(&target.history_endpoint()).await {
            Ok(records) => {
                debug!(target = %target, count = records.len(), "history fetched");
                self.to_messages(records)
            }
            Err(e) => {
                warn!(target = %target, error = %e, "history fetch failed; starting empty");
                Vec::new()
            }
        }
    }

    fn to_messages(&self, records: Vec<HistoryRecord>) -> Vec<Message> {
        let mut keyed: Vec<_> = records
            .into_iter()
            .map(|record| {
                let key = DateTime::parse_from_rfc3339(&record.timestamp).ok();
                (key, self.to_message(record))
            })
            .collect();

        // Unparseable timestamps leave the server's order alone
        if keyed.iter().all(|(key, _)| key.is_some()) {
            keyed.sort_by_key(|(key, _)| *key);
        }

        keyed.into_iter().map(|(_, message)| message).collect()
    }

    fn to_message(&self, record: HistoryRecord) -> Message {
        let display_name = if !record.sender_name.is_empty() {
            record.sender_name
        } else if record.sender == self.identity.identity {
            self.identity.display_name.clone()
        } else {
            record.sender.clone()
        };

        Message::new(record.message, record.sender, display_name, record.timestamp, Origin::History)
    }
}
