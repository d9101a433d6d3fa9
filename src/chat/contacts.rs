use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::events::SessionEvent;
use super::target::ConversationTarget;
use crate::api::ChatApi;

/// Summary row for a direct-conversation partner
///
/// Accepts both the canonical field names and the shape the chat server
/// emits (`email`, `name`, `lastMessage`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    #[serde(alias = "email")]
    pub identity: String,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default, alias = "lastMessage")]
    pub last_message_preview: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
}

impl ContactSummary {
    pub fn new(identity: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
            last_message_preview: None,
            last_message_time: None,
            unread_count: 0,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.display_name.to_lowercase().contains(needle)
            || self.identity.to_lowercase().contains(needle)
    }
}

/// A contact together with its highlight flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactView {
    pub summary: ContactSummary,
    pub selected: bool,
}

/// Periodically replaced list of conversation partners
#[derive(Debug, Default)]
pub struct ContactDirectory {
    contacts: Vec<ContactSummary>,
    selected: Option<usize>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list and recompute the highlight from `active`
    pub fn replace(&mut self, contacts: Vec<ContactSummary>, active: Option<&ConversationTarget>) {
        self.contacts = contacts;
        self.highlight(active);
    }

    /// Recompute which entry is selected by identity
    pub fn highlight(&mut self, active: Option<&ConversationTarget>) {
        self.selected = active.and_then(|target| {
            self.contacts
                .iter()
                .position(|c| target.is_direct_with(&c.identity))
        });
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn selected(&self) -> Option<&ContactSummary> {
        self.selected.and_then(|idx| self.contacts.get(idx))
    }

    pub fn entries(&self) -> Vec<ContactView> {
        self.contacts
            .iter()
            .enumerate()
            .map(|(idx, summary)| ContactView {
                summary: summary.clone(),
                selected: self.selected == Some(idx),
            })
            .collect()
    }

    /// Case-insensitive filter on display name or identity
    pub fn search(&self, query: &str) -> Vec<ContactView> {
        let needle = query.trim().to_lowercase();
        self.entries()
            .into_iter()
            .filter(|view| needle.is_empty() || view.summary.matches(&needle))
            .collect()
    }
}

/// Background task refreshing the contact list on a fixed interval
///
/// Results are forwarded to the session's event pump. Failed polls are
/// skipped and retried on the next tick.
pub struct ContactPoller {
    cancel: CancellationToken,
}

impl ContactPoller {
    pub fn spawn(
        api: Arc<dyn ChatApi>,
        period: Duration,
        events: mpsc::UnboundedSender<SessionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let fetched = tokio::select! {
                    _ = token.cancelled() => break,
                    fetched = api.contacts() => fetched,
                };

                match fetched {
                    Ok(contacts) => {
                        debug!(count = contacts.len(), "contact list refreshed");
                        if events.send(SessionEvent::ContactsRefreshed(contacts)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "contact poll failed; keeping previous list"),
                }
            }
            debug!("contact poller stopped");
        });

        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ContactPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
