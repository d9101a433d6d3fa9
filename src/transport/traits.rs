use async_trait::async_trait;
use reqwest::Url;

use crate::utils::HuddleError;

/// Opens streaming connections
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, address: &Url) -> Result<Box<dyn Link>, HuddleError>;
}

/// One open bidirectional text connection
#[async_trait]
pub trait Link: Send {
    async fn send_text(&mut self, text: String) -> Result<(), HuddleError>;

    /// Next inbound text frame; `None` once the peer has closed
    async fn next_text(&mut self) -> Option<Result<String, HuddleError>>;

    /// Request close; safe to call more than once
    async fn close(&mut self) -> Result<(), HuddleError>;
}
