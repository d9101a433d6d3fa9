// Gateway module for the conversation session - follows the Train Station Pattern
// All external access must go through this gateway

mod contacts;
mod events;
mod history;
mod log;
mod manager;
mod message;
mod state;
pub mod target;

pub use contacts::{ContactDirectory, ContactPoller, ContactSummary, ContactView};
pub use events::{
    ConnectionEvent, ConnectionEventKind, ConnectionState, Generation, SessionEvent, SessionNotice,
};
pub use history::HistoryLoader;
pub use log::{HistoryMerge, MessageLog};
pub use manager::{SessionManager, SessionSettings};
pub use message::{Message, Origin, SessionIdentity};
pub use state::{OpenRequest, SessionHandle, SessionState, Switch, Teardown};
pub use target::{ConversationTarget, HistoryEndpoint, TargetKind, TargetResolver};
