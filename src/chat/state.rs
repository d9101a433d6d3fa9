use reqwest::Url;
use tracing::{debug, info, warn};

use super::contacts::ContactDirectory;
use super::events::{ConnectionEventKind, ConnectionState, Generation, SessionEvent, SessionNotice};
use super::log::{HistoryMerge, MessageLog};
use super::message::{Message, Origin, SessionIdentity};
use super::target::{ConversationTarget, TargetResolver};
use crate::transport::ChatFrame;
use crate::utils::HuddleError;

/// The single live binding between a target and its connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub target: ConversationTarget,
    pub generation: Generation,
    pub state: ConnectionState,
}

/// Connection the caller must open for a freshly selected target
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub generation: Generation,
    pub target: ConversationTarget,
    pub address: Url,
}

/// Side effects of a target switch
#[derive(Debug)]
pub struct Switch {
    /// Generation whose connection must be closed, if any
    pub retired: Option<Generation>,
    pub open: OpenRequest,
    pub notices: Vec<SessionNotice>,
}

/// Side effects of clearing the selection
#[derive(Debug)]
pub struct Teardown {
    pub retired: Option<Generation>,
    pub notices: Vec<SessionNotice>,
}

/// Session state machine
///
/// Pure and synchronous. Every mutation happens through `select`, `clear` or
/// `apply`, so whoever owns it decides how those calls are serialized.
#[derive(Debug)]
pub struct SessionState {
    identity: SessionIdentity,
    connection_base: Url,
    resolver: TargetResolver,
    generation: Generation,
    handle: Option<SessionHandle>,
    log: MessageLog,
    contacts: ContactDirectory,
}

impl SessionState {
    pub fn new(identity: SessionIdentity, connection_base: Url) -> Self {
        Self {
            identity,
            connection_base,
            resolver: TargetResolver::new(),
            generation: Generation::default(),
            handle: None,
            log: MessageLog::new(),
            contacts: ContactDirectory::new(),
        }
    }

    /// Switch to `target` as one atomic step
    ///
    /// The old handle is retired, the generation bumped and the log cleared
    /// before anything asynchronous for the new target can report back.
    pub fn select(&mut self, target: ConversationTarget) -> Result<Switch, HuddleError> {
        let address = target.connection_address(&self.connection_base)?;

        let retired = self.retire();
        self.generation = self.generation.next();
        let generation = self.generation;

        self.resolver.select(target.clone());
        self.log.reset(generation);
        self.contacts.highlight(self.resolver.active());
        self.handle = Some(SessionHandle {
            target: target.clone(),
            generation,
            state: ConnectionState::Connecting,
        });

        info!(%generation, target = %target, "conversation selected");

        Ok(Switch {
            retired,
            notices: vec![
                SessionNotice::TargetChanged(Some(target.clone())),
                SessionNotice::LogCleared,
                SessionNotice::ConnectionChanged {
                    generation,
                    state: ConnectionState::Connecting,
                },
            ],
            open: OpenRequest {
                generation,
                target,
                address,
            },
        })
    }

    /// Drop the selection; late events for the retired generation become stale
    pub fn clear(&mut self) -> Teardown {
        let retired = self.retire();
        self.generation = self.generation.next();
        self.resolver.clear();
        self.log.reset(self.generation);
        self.contacts.highlight(None);

        let mut notices = vec![SessionNotice::TargetChanged(None), SessionNotice::LogCleared];
        if let Some(generation) = retired {
            notices.push(SessionNotice::ConnectionChanged {
                generation,
                state: ConnectionState::Disconnected,
            });
        }
        Teardown { retired, notices }
    }

    fn retire(&mut self) -> Option<Generation> {
        self.handle.take().map(|handle| {
            debug!(generation = %handle.generation, target = %handle.target, "retiring session");
            handle.generation
        })
    }

    /// Apply one event and report what changed
    pub fn apply(&mut self, event: SessionEvent) -> Vec<SessionNotice> {
        match event {
            SessionEvent::Connection(event) => self.apply_connection(event.generation, event.kind),
            SessionEvent::HistoryLoaded {
                generation,
                messages,
            } => self.apply_history(generation, messages),
            SessionEvent::ContactsRefreshed(contacts) => {
                self.contacts.replace(contacts, self.resolver.active());
                vec![SessionNotice::ContactsUpdated {
                    count: self.contacts.len(),
                    selected: self.contacts.selected().map(|c| c.identity.clone()),
                }]
            }
        }
    }

    fn apply_connection(
        &mut self,
        generation: Generation,
        kind: ConnectionEventKind,
    ) -> Vec<SessionNotice> {
        let handle = match self.handle.as_mut() {
            Some(handle) if handle.generation == generation => handle,
            _ => {
                debug!(%generation, current = %self.generation, "dropping stale connection event");
                return Vec::new();
            }
        };

        let next_state = match kind {
            ConnectionEventKind::Opened => {
                if handle.state != ConnectionState::Connecting {
                    return Vec::new();
                }
                ConnectionState::Connected
            }
            ConnectionEventKind::Frame(raw) => {
                let message = match ChatFrame::parse(&raw) {
                    Ok(frame) => frame.into_message(Origin::Live),
                    Err(e) => {
                        warn!(%generation, error = %e, "dropping malformed frame");
                        return Vec::new();
                    }
                };
                if self.log.append_live(generation, message.clone()) {
                    return vec![SessionNotice::MessageAppended(message)];
                }
                return Vec::new();
            }
            ConnectionEventKind::Error(reason) => {
                warn!(%generation, %reason, "connection failed");
                ConnectionState::Disconnected
            }
            ConnectionEventKind::Closed => {
                info!(%generation, "connection closed");
                ConnectionState::Disconnected
            }
        };

        if handle.state == next_state {
            return Vec::new();
        }
        handle.state = next_state;
        vec![SessionNotice::ConnectionChanged {
            generation,
            state: next_state,
        }]
    }

    fn apply_history(&mut self, generation: Generation, messages: Vec<Message>) -> Vec<SessionNotice> {
        match self.log.apply_history(generation, messages.clone()) {
            HistoryMerge::Ignored => {
                debug!(%generation, current = %self.generation, "dropping history batch");
                Vec::new()
            }
            merge => {
                debug!(%generation, count = messages.len(), ?merge, "history applied");
                vec![SessionNotice::HistoryApplied {
                    generation,
                    messages,
                    merge,
                }]
            }
        }
    }

    /// Validate an outbound message and encode its frame
    ///
    /// The log is never touched; the server echo is the only copy that lands in it.
    pub fn prepare_send(&self, text: &str) -> Result<(Generation, String), HuddleError> {
        let handle = self
            .handle
            .as_ref()
            .filter(|handle| handle.state == ConnectionState::Connected)
            .ok_or(HuddleError::NotConnected)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(HuddleError::EmptyMessage);
        }

        let frame = ChatFrame::outgoing(text, &self.identity).encode()?;
        Ok((handle.generation, frame))
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn active_target(&self) -> Option<&ConversationTarget> {
        self.resolver.active()
    }

    pub fn handle(&self) -> Option<&SessionHandle> {
        self.handle.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.handle
            .as_ref()
            .map(|handle| handle.state)
            .unwrap_or_default()
    }

    pub fn messages(&self) -> &[Message] {
        self.log.entries()
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn contacts(&self) -> &ContactDirectory {
        &self.contacts
    }
}
