//! Direct send to a known thread id, bypassing the reference store.

use crate::channels::ConversationsApi;
use crate::error::SendError;
use crate::schema::Activity;
use std::sync::Arc;

/// Sends text straight into a thread on one fixed service URL.
pub struct DirectSender {
    api: Arc<dyn ConversationsApi>,
    service_url: String,
}

impl DirectSender {
    pub fn new(api: Arc<dyn ConversationsApi>, service_url: impl Into<String>) -> Self {
        Self {
            api,
            service_url: service_url.into(),
        }
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Post `text` into `thread_id`, passed through as given. Every failure comes back as a
    /// tagged `SendError`.
    pub async fn send_text(&self, thread_id: &str, text: &str) -> Result<(), SendError> {
        if thread_id.trim().is_empty() {
            return Err(SendError::NotFound("empty thread id".to_string()));
        }
        let activity = Activity::text(text);
        let result = self
            .api
            .send_to_conversation(&self.service_url, thread_id, &activity)
            .await;
        match &result {
            Ok(()) => log::debug!("direct send to {} delivered", thread_id),
            Err(e) => log::warn!("direct send to {} failed ({}): {}", thread_id, e.kind(), e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{AppCredentials, ConnectorClient, TrustedServiceUrls};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String, Option<String>)>>,
    }

    #[async_trait]
    impl ConversationsApi for Recorder {
        async fn send_to_conversation(
            &self,
            service_url: &str,
            conversation_id: &str,
            activity: &Activity,
        ) -> Result<(), SendError> {
            self.sent.lock().unwrap().push((
                service_url.to_string(),
                conversation_id.to_string(),
                activity.text.clone(),
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_text_posts_to_fixed_service_url() {
        let recorder = Arc::new(Recorder::default());
        let sender = DirectSender::new(recorder.clone(), "https://smba.trafficmanager.net/emea/");
        sender.send_text("19:thread", "hello").await.unwrap();
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![(
                "https://smba.trafficmanager.net/emea/".to_string(),
                "19:thread".to_string(),
                Some("hello".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn empty_thread_id_is_not_found_without_a_call() {
        let recorder = Arc::new(Recorder::default());
        let sender = DirectSender::new(recorder.clone(), "https://example.test/");
        let err = sender.send_text("  ", "hello").await.unwrap_err();
        assert!(matches!(err, SendError::NotFound(_)));
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn thread_id_is_sent_unchanged() {
        let recorder = Arc::new(Recorder::default());
        let sender = DirectSender::new(recorder.clone(), "https://example.test/");
        sender.send_text(" 19:x ", "hello").await.unwrap();
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, " 19:x ");
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_without_panicking() {
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let service_url = format!("http://127.0.0.1:{}/", port);
        let client = ConnectorClient::new(
            AppCredentials::new("", ""),
            Arc::new(TrustedServiceUrls::new([service_url.as_str()])),
            Duration::from_secs(2),
        )
        .unwrap();
        let sender = DirectSender::new(Arc::new(client), service_url);
        let result = sender.send_text("bad-thread", "hi").await;
        assert!(result.is_err());
    }
}
