//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.beacon/config.json`) and environment.
//! App credentials may come from `MICROSOFT_APP_ID` / `MICROSOFT_APP_PASSWORD` instead of the file.

use crate::channels::{DEFAULT_OAUTH_SCOPE, DEFAULT_SERVICE_URL, DEFAULT_TOKEN_ENDPOINT};
use crate::dispatch::DEFAULT_BROADCAST_CONCURRENCY;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Connector credentials and service endpoint.
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Texts and fan-out for proactive messages.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Reference store retention.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3978).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3978
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Connector client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    /// Application id. Overridden by MICROSOFT_APP_ID env. Empty = no token (emulator).
    pub app_id: Option<String>,
    /// Application secret. Overridden by MICROSOFT_APP_PASSWORD env.
    pub app_password: Option<String>,
    /// Regional service endpoint used for direct sends; always trusted.
    #[serde(default = "default_service_url")]
    pub service_url: String,
    /// Extra service URLs allowed to receive our token.
    #[serde(default)]
    pub trusted_service_urls: Vec<String>,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_oauth_scope")]
    pub oauth_scope: String,
    /// Per-request timeout in seconds (default 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_token_endpoint() -> String {
    DEFAULT_TOKEN_ENDPOINT.to_string()
}

fn default_oauth_scope() -> String {
    DEFAULT_OAUTH_SCOPE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_password: None,
            service_url: default_service_url(),
            trusted_service_urls: Vec::new(),
            token_endpoint: default_token_endpoint(),
            oauth_scope: default_oauth_scope(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Message texts and broadcast fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyConfig {
    /// Sent by broadcast and per-user dispatch.
    #[serde(default = "default_broadcast_text")]
    pub broadcast_text: String,
    /// Sent to a thread when the request carries no message.
    #[serde(default = "default_direct_text")]
    pub direct_text: String,
    #[serde(default = "default_broadcast_concurrency")]
    pub broadcast_concurrency: usize,
}

fn default_broadcast_text() -> String {
    "proactive hello".to_string()
}

fn default_direct_text() -> String {
    "A message from me to you".to_string()
}

fn default_broadcast_concurrency() -> usize {
    DEFAULT_BROADCAST_CONCURRENCY
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            broadcast_text: default_broadcast_text(),
            direct_text: default_direct_text(),
            broadcast_concurrency: default_broadcast_concurrency(),
        }
    }
}

/// Reference retention. Without a TTL, references live as long as the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Evict references not refreshed for this many seconds.
    pub reference_ttl_secs: Option<u64>,
    /// How often the eviction sweep runs (default 300).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reference_ttl_secs: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the app id: env MICROSOFT_APP_ID overrides config. Empty string when unset.
pub fn resolve_app_id(config: &Config) -> String {
    env_non_empty("MICROSOFT_APP_ID")
        .or_else(|| {
            config
                .connector
                .app_id
                .as_ref()
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_default()
}

/// Resolve the app secret: env MICROSOFT_APP_PASSWORD overrides config.
pub fn resolve_app_password(config: &Config) -> String {
    env_non_empty("MICROSOFT_APP_PASSWORD")
        .or_else(|| config.connector.app_password.clone())
        .unwrap_or_default()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("BEACON_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".beacon").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
