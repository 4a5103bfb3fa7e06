//! Connector client: app-token acquisition and `POST /v3/conversations/{id}/activities`.

use crate::error::SendError;
use crate::schema::Activity;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_SERVICE_URL: &str = "https://smba.trafficmanager.net/emea/";
pub const DEFAULT_TOKEN_ENDPOINT: &str =
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";
pub const DEFAULT_OAUTH_SCOPE: &str = "https://api.botframework.com/.default";

/// Refresh tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Anything that can post an activity into a conversation at a service URL.
#[async_trait]
pub trait ConversationsApi: Send + Sync {
    async fn send_to_conversation(
        &self,
        service_url: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<(), SendError>;
}

/// Application credentials (id + secret) and where to exchange them for a token.
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_password: String,
    pub token_endpoint: String,
    pub oauth_scope: String,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_password: app_password.into(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            oauth_scope: DEFAULT_OAUTH_SCOPE.to_string(),
        }
    }

    /// No app id means an unauthenticated local channel (e.g. the emulator); skip tokens.
    pub fn is_anonymous(&self) -> bool {
        self.app_id.trim().is_empty()
    }
}

/// Service URLs we are willing to send credentials to. Fixed once built.
#[derive(Debug, Default)]
pub struct TrustedServiceUrls {
    origins: HashSet<String>,
}

/// scheme://host:port, lowercase. None for unparsable URLs.
fn origin_of(url: &str) -> Option<String> {
    let url = Url::parse(url.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let port = url.port_or_known_default()?;
    Some(format!("{}://{}:{}", url.scheme(), host, port))
}

impl TrustedServiceUrls {
    /// Unparsable URLs are skipped.
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let origins = urls
            .into_iter()
            .filter_map(|url| {
                let url = url.as_ref();
                let origin = origin_of(url);
                if origin.is_none() {
                    log::warn!("ignoring unparsable service url: {}", url);
                }
                origin
            })
            .collect();
        Self { origins }
    }

    pub fn is_trusted(&self, url: &str) -> bool {
        origin_of(url).is_some_and(|origin| self.origins.contains(&origin))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// HTTP client for the channel connector service.
pub struct ConnectorClient {
    credentials: AppCredentials,
    trusted: Arc<TrustedServiceUrls>,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl ConnectorClient {
    pub fn new(
        credentials: AppCredentials,
        trusted: Arc<TrustedServiceUrls>,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SendError::Unknown(e.to_string()))?;
        Ok(Self {
            credentials,
            trusted,
            client,
            token: Mutex::new(None),
        })
    }

    /// Bearer token for the connector, cached until shortly before expiry. None when anonymous.
    async fn bearer_token(&self) -> Result<Option<String>, SendError> {
        if self.credentials.is_anonymous() {
            return Ok(None);
        }
        let mut cached = self.token.lock().await;
        if let Some(ref t) = *cached {
            if Instant::now() < t.refresh_at {
                return Ok(Some(t.value.clone()));
            }
        }
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.app_id.as_str()),
            ("client_secret", self.credentials.app_password.as_str()),
            ("scope", self.credentials.oauth_scope.as_str()),
        ];
        let res = self
            .client
            .post(&self.credentials.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| SendError::Unauthorized(format!("token request failed: {}", e)))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SendError::Unauthorized(format!(
                "token request rejected: {} {}",
                status, body
            )));
        }
        let data: TokenResponse = res
            .json()
            .await
            .map_err(|e| SendError::Unauthorized(format!("invalid token response: {}", e)))?;
        let lifetime = Duration::from_secs(data.expires_in.unwrap_or(3600));
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN);
        log::debug!("connector: acquired app token (expires in {}s)", lifetime.as_secs());
        *cached = Some(CachedToken {
            value: data.access_token.clone(),
            refresh_at,
        });
        Ok(Some(data.access_token))
    }
}

/// `{service_url}/v3/conversations/{conversation_id}/activities`, with the id percent-encoded as one segment.
fn activities_url(service_url: &str, conversation_id: &str) -> Result<Url, SendError> {
    let base = format!("{}/", service_url.trim().trim_end_matches('/'));
    let mut url = Url::parse(&base)
        .map_err(|e| SendError::Unknown(format!("invalid service url {}: {}", service_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| SendError::Unknown(format!("service url cannot be a base: {}", service_url)))?
        .pop_if_empty()
        .extend(["v3", "conversations", conversation_id, "activities"]);
    Ok(url)
}

fn classify_status(status: StatusCode, body: String) -> SendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SendError::Unauthorized(format!("{} {}", status, body))
        }
        StatusCode::NOT_FOUND => SendError::NotFound(format!("{} {}", status, body)),
        _ => SendError::Unknown(format!("{} {}", status, body)),
    }
}

#[async_trait]
impl ConversationsApi for ConnectorClient {
    async fn send_to_conversation(
        &self,
        service_url: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<(), SendError> {
        if conversation_id.trim().is_empty() {
            return Err(SendError::NotFound("empty conversation id".to_string()));
        }
        if !self.trusted.is_trusted(service_url) {
            return Err(SendError::Unauthorized(format!(
                "service url not trusted: {}",
                service_url
            )));
        }
        let url = activities_url(service_url, conversation_id)?;
        let token = self.bearer_token().await?;
        let mut req = self.client.post(url).json(activity);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }
        Ok(())
    }
}
