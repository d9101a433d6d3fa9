// Gateway module for api - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod client;
mod traits;
mod types;

// Public re-exports - the ONLY way to access api functionality
pub use client::ApiClient;
pub use traits::ChatApi;
pub use types::{Credentials, HistoryRecord};

#[cfg(test)]
pub use traits::MockChatApi;
