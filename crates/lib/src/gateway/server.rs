//! Gateway HTTP server: notify routes, inbound activities, health.

use crate::channels::{
    AppCredentials, ConnectorAdapter, ConnectorClient, ConversationsApi, TrustedServiceUrls,
};
use crate::config::{self, Config};
use crate::direct::DirectSender;
use crate::dispatch::Dispatcher;
use crate::gateway::notify;
use crate::references::ReferenceStore;
use crate::schema::Activity;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for the gateway. Built once at startup by [`build_state`].
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub store: Arc<ReferenceStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub direct: Arc<DirectSender>,
}

/// One-time startup: resolve credentials, register trusted service URLs, and wire the store,
/// connector, dispatcher and direct sender together.
pub fn build_state(config: Config) -> Result<GatewayState> {
    let mut credentials =
        AppCredentials::new(config::resolve_app_id(&config), config::resolve_app_password(&config));
    credentials.token_endpoint = config.connector.token_endpoint.clone();
    credentials.oauth_scope = config.connector.oauth_scope.clone();
    if credentials.is_anonymous() {
        log::warn!("no app id configured; sending without an app token");
    }

    let trusted = Arc::new(TrustedServiceUrls::new(
        std::iter::once(&config.connector.service_url).chain(&config.connector.trusted_service_urls),
    ));
    let timeout = Duration::from_secs(config.connector.request_timeout_secs.max(1));
    let connector: Arc<dyn ConversationsApi> = Arc::new(
        ConnectorClient::new(credentials, trusted, timeout).context("building connector client")?,
    );

    let store = Arc::new(ReferenceStore::new());
    let adapter = Arc::new(ConnectorAdapter::new(connector.clone()));
    let dispatcher = Dispatcher::new(store.clone(), adapter)
        .with_concurrency(config.notify.broadcast_concurrency);
    let direct = DirectSender::new(connector, config.connector.service_url.clone());

    Ok(GatewayState {
        config: Arc::new(config),
        store,
        dispatcher: Arc::new(dispatcher),
        direct: Arc::new(direct),
    })
}

/// All gateway routes over the given state.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/api/messages", post(inbound_activity))
        .merge(notify::routes())
        .with_state(state)
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    if !is_loopback_bind(&bind) {
        log::warn!(
            "binding gateway to {}; notify routes are unauthenticated and reachable from the network",
            bind
        );
    }
    let port = config.gateway.port;
    let state = build_state(config)?;

    if let Some(ttl) = state.config.store.reference_ttl_secs {
        spawn_eviction_sweep(
            state.store.clone(),
            Duration::from_secs(ttl),
            Duration::from_secs(state.config.store.sweep_interval_secs.max(1)),
        );
    }

    let app = router(state);
    let bind_addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Periodically drop references that have not been refreshed within `ttl`.
fn spawn_eviction_sweep(store: Arc<ReferenceStore>, ttl: Duration, every: Duration) {
    log::info!(
        "reference eviction enabled: ttl {}s, sweep every {}s",
        ttl.as_secs(),
        every.as_secs()
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = store.evict_older_than(ttl).await;
            if removed > 0 {
                log::info!("evicted {} stale conversation reference(s)", removed);
            }
        }
    });
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /api/messages — records the conversation reference of an inbound activity.
async fn inbound_activity(State(state): State<GatewayState>, body: Bytes) -> StatusCode {
    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(a) => a,
        Err(e) => {
            log::debug!("inbound: unparsable activity: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    match state.store.upsert_from_activity(&activity).await {
        Some(id) => log::debug!("inbound: stored reference for conversation {}", id),
        None => log::debug!("inbound: {} activity without conversation, ignored", activity.typ),
    }
    StatusCode::OK
}

/// GET / returns a simple health JSON (liveness checks).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "references": state.store.len().await,
        "port": state.config.gateway.port,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_binds() {
        assert!(is_loopback_bind("127.0.0.1"));
        assert!(is_loopback_bind(" ::1 "));
        assert!(is_loopback_bind("localhost"));
        assert!(!is_loopback_bind("0.0.0.0"));
    }

    #[test]
    fn build_state_uses_configured_service_url() {
        let mut config = Config::default();
        config.connector.service_url = "http://127.0.0.1:9/".to_string();
        let state = build_state(config).unwrap();
        assert_eq!(state.direct.service_url(), "http://127.0.0.1:9/");
    }
}
