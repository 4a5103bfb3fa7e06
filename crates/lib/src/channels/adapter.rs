//! Continue-conversation adapter: re-enter a stored conversation and deliver a produced activity.

use crate::channels::connector::ConversationsApi;
use crate::error::SendError;
use crate::schema::{Activity, ConversationReference};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces the activity to send into a resumed conversation.
pub trait MessageProducer: Send + Sync {
    fn produce(&self, reference: &ConversationReference) -> Activity;
}

/// Fixed text sent to every conversation.
#[derive(Debug, Clone)]
pub struct TextMessage(pub String);

impl MessageProducer for TextMessage {
    fn produce(&self, _reference: &ConversationReference) -> Activity {
        Activity::text(self.0.clone())
    }
}

impl<F> MessageProducer for F
where
    F: Fn(&ConversationReference) -> Activity + Send + Sync,
{
    fn produce(&self, reference: &ConversationReference) -> Activity {
        self(reference)
    }
}

/// Channel-specific "continue conversation" capability.
#[async_trait]
pub trait ConversationAdapter: Send + Sync {
    async fn continue_conversation(
        &self,
        reference: &ConversationReference,
        producer: &dyn MessageProducer,
    ) -> Result<(), SendError>;
}

/// Adapter that addresses the produced activity from the reference and posts it through the connector.
pub struct ConnectorAdapter {
    api: Arc<dyn ConversationsApi>,
}

impl ConnectorAdapter {
    pub fn new(api: Arc<dyn ConversationsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ConversationAdapter for ConnectorAdapter {
    async fn continue_conversation(
        &self,
        reference: &ConversationReference,
        producer: &dyn MessageProducer,
    ) -> Result<(), SendError> {
        let activity = producer.produce(reference).apply_reference(reference);
        self.api
            .send_to_conversation(&reference.service_url, reference.conversation_id(), &activity)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ChannelAccount, ConversationAccount};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String, Activity)>>,
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
                activity.clone(),
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn continue_conversation_sends_addressed_activity() {
        let recorder = Arc::new(Recorder::default());
        let adapter = ConnectorAdapter::new(recorder.clone());
        let reference = ConversationReference {
            channel_id: "msteams".to_string(),
            conversation: ConversationAccount {
                id: "conv1".to_string(),
                ..Default::default()
            },
            service_url: "https://example.test/".to_string(),
            user: ChannelAccount {
                id: "u1".to_string(),
                ..Default::default()
            },
            bot: ChannelAccount {
                id: "b1".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        adapter
            .continue_conversation(&reference, &TextMessage("proactive hello".to_string()))
            .await
            .unwrap();
        let greet = |r: &ConversationReference| Activity::text(format!("hi {}", r.user.id));
        adapter.continue_conversation(&reference, &greet).await.unwrap();

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "https://example.test/");
        assert_eq!(sent[0].1, "conv1");
        assert_eq!(sent[0].2.text.as_deref(), Some("proactive hello"));
        assert_eq!(sent[0].2.recipient.as_ref().map(|a| a.id.as_str()), Some("u1"));
        assert_eq!(sent[1].2.text.as_deref(), Some("hi u1"));
    }
}
