// Gateway module for transport - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod frame;
mod traits;
mod websocket;

#[cfg(test)]
pub(crate) mod memory;

// Public re-exports - the ONLY way to access transport functionality
pub use frame::ChatFrame;
pub use traits::{Link, Transport};
pub use websocket::WebSocketTransport;
