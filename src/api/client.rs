use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::ChatApi;
use super::types::{Credentials, HistoryRecord};
use crate::chat::target::extend_path;
use crate::chat::{ContactSummary, HistoryEndpoint};
use crate::constants::{
    ACCESS_TOKEN_COOKIE, CHAT_SEGMENT, CONTACTS_SEGMENT, HTTP_REQUEST_TIMEOUT_SECS,
    REFRESH_TOKEN_COOKIE,
};
use crate::utils::HuddleError;

/// Credential-bearing REST client
///
/// Credentials live in a cookie jar shared with the streaming transport. An
/// authorization failure triggers exactly one renewal followed by one retry.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    refresh_url: Url,
    jar: Arc<Jar>,
}

impl ApiClient {
    /// Create a client rooted at `base_url`, seeding the jar with `credentials`
    pub fn new(
        base_url: Url,
        refresh_path: &str,
        credentials: &Credentials,
    ) -> Result<Self, HuddleError> {
        let refresh_url = base_url
            .join(refresh_path)
            .map_err(|e| HuddleError::InvalidAddress(format!("{}: {}", refresh_path, e)))?;

        let jar = Arc::new(Jar::default());
        let cookies = [
            (ACCESS_TOKEN_COOKIE, &credentials.access_token),
            (REFRESH_TOKEN_COOKIE, &credentials.refresh_token),
        ];
        for (name, value) in cookies {
            if let Some(value) = value {
                jar.add_cookie_str(&format!("{}={}; Path=/", name, value), &base_url);
            }
        }

        let http = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url,
            refresh_url,
            jar,
        })
    }

    /// Current `Cookie` header value, for handshakes made outside reqwest
    pub fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, HuddleError> {
        let response = self.send_authorized(|| self.http.get(url.clone())).await?;
        Ok(response.json::<T>().await?)
    }

    /// Send, and on 401 renew once and retry once
    async fn send_authorized<F>(&self, build: F) -> Result<Response, HuddleError>
    where
        F: Fn() -> RequestBuilder,
    {
        let response = build().send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return ensure_success(response).await;
        }

        debug!("request unauthorized; renewing credentials");
        self.renew().await?;

        let retried = build().send().await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(HuddleError::Unauthorized);
        }
        ensure_success(retried).await
    }

    async fn renew(&self) -> Result<(), HuddleError> {
        let response = self.http.post(self.refresh_url.clone()).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            warn!(status = %response.status(), "credential renewal failed");
            Err(HuddleError::Unauthorized)
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, HuddleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HuddleError::ApiError {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn history(&self, endpoint: &HistoryEndpoint) -> Result<Vec<HistoryRecord>, HuddleError> {
        let url = endpoint.url(&self.base_url)?;
        self.get_json(url).await
    }

    async fn contacts(&self) -> Result<Vec<ContactSummary>, HuddleError> {
        let url = extend_path(&self.base_url, &[CHAT_SEGMENT, CONTACTS_SEGMENT])?;
        self.get_json(url).await
    }
}
