use serde::{Deserialize, Serialize};
use std::fmt;

use super::contacts::ContactSummary;
use super::log::HistoryMerge;
use super::message::Message;
use super::target::ConversationTarget;

/// Monotonic session counter, bumped on every target switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Lifecycle of the live connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// What the transport reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEventKind {
    Opened,
    /// Raw text frame, parsed by the session
    Frame(String),
    Error(String),
    Closed,
}

/// A transport event tagged with the generation of the connection that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub generation: Generation,
    pub kind: ConnectionEventKind,
}

impl ConnectionEvent {
    pub fn new(generation: Generation, kind: ConnectionEventKind) -> Self {
        Self { generation, kind }
    }
}

/// Everything funneled through the serialized session handler
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connection(ConnectionEvent),
    HistoryLoaded {
        generation: Generation,
        messages: Vec<Message>,
    },
    ContactsRefreshed(Vec<ContactSummary>),
}

/// Change notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    TargetChanged(Option<ConversationTarget>),
    ConnectionChanged {
        generation: Generation,
        state: ConnectionState,
    },
    LogCleared,
    /// The batch that went into the log, so observers never re-read it
    HistoryApplied {
        generation: Generation,
        messages: Vec<Message>,
        merge: HistoryMerge,
    },
    MessageAppended(Message),
    ContactsUpdated {
        count: usize,
        selected: Option<String>,
    },
}
