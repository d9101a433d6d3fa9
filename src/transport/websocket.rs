use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::tungstenite::http::{header::COOKIE, HeaderValue};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::traits::{Link, Transport};
use crate::api::ApiClient;
use crate::utils::HuddleError;

/// WebSocket transport
///
/// When built with credentials, the handshake carries the same cookies as
/// the REST client, read fresh on every connect so renewals propagate.
#[derive(Default)]
pub struct WebSocketTransport {
    credentials: Option<Arc<ApiClient>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(client: Arc<ApiClient>) -> Self {
        Self {
            credentials: Some(client),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, address: &Url) -> Result<Box<dyn Link>, HuddleError> {
        let mut request = address.as_str().into_client_request()?;
        if let Some(cookie) = self.credentials.as_ref().and_then(|c| c.cookie_header()) {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| HuddleError::TransportError(format!("invalid cookie header: {}", e)))?;
            request.headers_mut().insert(COOKIE, value);
        }

        let (stream, response) = connect_async(request).await?;
        info!(address = %address, status = %response.status(), "connection opened");

        Ok(Box::new(WebSocketLink { stream }))
    }
}

struct WebSocketLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Link for WebSocketLink {
    async fn send_text(&mut self, text: String) -> Result<(), HuddleError> {
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, HuddleError>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "peer closed connection");
                    return None;
                }
                // Pings are answered by tungstenite on the next read
                Ok(_) => continue,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), HuddleError> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
