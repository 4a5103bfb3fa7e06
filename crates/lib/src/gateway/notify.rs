//! `/api/notifyusers` routes: broadcast, per-user dispatch, and direct thread sends.
//!
//! Every response is a small HTML page with a single `<h1>` status line.

use crate::channels::TextMessage;
use crate::dispatch::UserDispatch;
use crate::gateway::server::GatewayState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};

const SENT: &str = "Proactive messages have been sent.";
const NOT_SENT: &str = "Proactive messages have NOT been sent.";

type Page = (StatusCode, Html<String>);

fn status_page(status: StatusCode, headline: &str) -> Page {
    (
        status,
        Html(format!("<html><body><h1>{}</h1></body></html>", headline)),
    )
}

fn user_not_found_page(user_id: &str) -> Page {
    status_page(
        StatusCode::NOT_FOUND,
        &format!(
            "Proactive messages have NOT been sent, user with id {} not found!",
            html_escape::encode_text(user_id)
        ),
    )
}

pub(super) fn routes() -> Router<GatewayState> {
    Router::new()
        .route("/api/notifyusers", get(notify_all))
        .route("/api/notifyusers/:userazureid", get(notify_user))
        .route("/api/notifyusers/chat/:chatthreadid", get(notify_thread))
        .route(
            "/api/notifyusers/chat/:chatthreadid/:message",
            get(notify_thread_message),
        )
}

/// GET /api/notifyusers — broadcast to every stored conversation. Always 200.
async fn notify_all(State(state): State<GatewayState>) -> Page {
    let producer = TextMessage(state.config.notify.broadcast_text.clone());
    let report = state.dispatcher.broadcast_proactive(&producer).await;
    log::info!(
        "notifyusers: {} of {} conversation(s) reached",
        report.succeeded(),
        report.attempted()
    );
    status_page(StatusCode::OK, SENT)
}

/// GET /api/notifyusers/{userazureid} — 200 when sent, 404 when no conversation matches, 500 when the send failed.
async fn notify_user(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Page {
    let producer = TextMessage(state.config.notify.broadcast_text.clone());
    match state.dispatcher.dispatch_to_user(&user_id, &producer).await {
        UserDispatch::Sent { .. } => status_page(StatusCode::OK, SENT),
        UserDispatch::NotFound => user_not_found_page(&user_id),
        UserDispatch::Failed { .. } => status_page(StatusCode::INTERNAL_SERVER_ERROR, NOT_SENT),
    }
}

/// GET /api/notifyusers/chat/{chatthreadid} — send the default direct text.
async fn notify_thread(
    State(state): State<GatewayState>,
    Path(thread_id): Path<String>,
) -> Page {
    let text = state.config.notify.direct_text.clone();
    send_to_thread(&state, &thread_id, &text).await
}

/// GET /api/notifyusers/chat/{chatthreadid}/{message} — send `message` verbatim (percent-decoded).
async fn notify_thread_message(
    State(state): State<GatewayState>,
    Path((thread_id, message)): Path<(String, String)>,
) -> Page {
    send_to_thread(&state, &thread_id, &message).await
}

async fn send_to_thread(state: &GatewayState, thread_id: &str, text: &str) -> Page {
    match state.direct.send_text(thread_id, text).await {
        Ok(()) => status_page(StatusCode::OK, SENT),
        Err(_) => status_page(StatusCode::INTERNAL_SERVER_ERROR, NOT_SENT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_page_escapes_user_id() {
        let (status, Html(body)) = user_not_found_page("<script>x</script>");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
        assert!(body.starts_with("<html><body><h1>Proactive messages have NOT been sent, user with id "));
    }

    #[test]
    fn sent_page_body() {
        let (status, Html(body)) = status_page(StatusCode::OK, SENT);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "<html><body><h1>Proactive messages have been sent.</h1></body></html>"
        );
    }
}
