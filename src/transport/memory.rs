//! In-process transport driven by tests

use async_trait::async_trait;
use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::traits::{Link, Transport};
use crate::utils::HuddleError;

/// Each `connect` call surfaces a `PeerHandle` and waits for the test to accept or refuse it
pub struct MemoryTransport {
    peers: mpsc::UnboundedSender<PeerHandle>,
}

impl MemoryTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PeerHandle>) {
        let (peers, incoming) = mpsc::unbounded_channel();
        (Self { peers }, incoming)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, address: &Url) -> Result<Box<dyn Link>, HuddleError> {
        let (accept_tx, accept_rx) = oneshot::channel();
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let peer = PeerHandle {
            address: address.clone(),
            accept: Some(accept_tx),
            to_client: Some(to_client),
            from_client,
            closed: closed.clone(),
        };
        self.peers
            .send(peer)
            .map_err(|_| HuddleError::TransportError("nobody listening".to_string()))?;

        match accept_rx.await {
            Ok(true) => Ok(Box::new(MemoryLink {
                inbound,
                outbound,
                closed,
            })),
            _ => Err(HuddleError::TransportError("connection refused".to_string())),
        }
    }
}

/// Server side of one connection attempt
pub struct PeerHandle {
    pub address: Url,
    accept: Option<oneshot::Sender<bool>>,
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl PeerHandle {
    pub fn accept(&mut self) {
        if let Some(tx) = self.accept.take() {
            let _ = tx.send(true);
        }
    }

    pub fn refuse(&mut self) {
        if let Some(tx) = self.accept.take() {
            let _ = tx.send(false);
        }
    }

    /// Deliver a raw text frame to the client
    pub fn push(&self, text: impl Into<String>) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(text.into());
        }
    }

    /// Close from the server side
    pub fn hang_up(&mut self) {
        self.to_client.take();
    }

    /// Next frame the client wrote, or `None` once the client side is gone
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// The client closed the link, or gave up before it was accepted
    pub fn is_abandoned(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
            || self.accept.as_ref().map(|tx| tx.is_closed()).unwrap_or(false)
    }
}

struct MemoryLink {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Link for MemoryLink {
    async fn send_text(&mut self, text: String) -> Result<(), HuddleError> {
        self.outbound
            .send(text)
            .map_err(|_| HuddleError::TransportError("peer gone".to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, HuddleError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), HuddleError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
