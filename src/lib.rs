pub mod api;
pub mod app;
pub mod chat;
pub mod cli;
pub mod constants;
pub mod runtime;
pub mod transport;
pub mod utils;

pub use api::{ApiClient, ChatApi};
pub use app::{load_config, Config};
pub use chat::{ConversationTarget, SessionManager, SessionNotice, SessionSettings};
pub use transport::{Transport, WebSocketTransport};
pub use utils::HuddleError;
