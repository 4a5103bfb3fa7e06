//! Wire types shared by the store, the connector, and the inbound endpoint.
//!
//! Field names follow the channel service's camelCase JSON (`serviceUrl`, `aadObjectId`, ...).

use serde::{Deserialize, Serialize};

/// Activity type for plain messages.
pub const MESSAGE_ACTIVITY: &str = "message";

/// A user or bot account on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Object id assigned by the external identity provider (Azure AD).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_object_id: Option<String>,
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// "personal", "groupChat" or "channel" on Teams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<String>,
}

/// Everything needed to re-enter a conversation later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    pub channel_id: String,
    pub conversation: ConversationAccount,
    pub service_url: String,
    pub user: ChannelAccount,
    pub bot: ChannelAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl ConversationReference {
    /// Conversation id used as the store key.
    pub fn conversation_id(&self) -> &str {
        &self.conversation.id
    }

    /// External identity-provider id of the user, if the channel supplied one.
    pub fn external_user_id(&self) -> Option<&str> {
        self.user.aad_object_id.as_deref()
    }
}

/// Subset of a channel activity: enough to send messages and to learn references from inbound traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl Activity {
    /// A plain text message with no addressing; the adapter fills in the rest.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            typ: MESSAGE_ACTIVITY.to_string(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Address this activity to the conversation in `reference` (bot as sender, user as recipient).
    pub fn apply_reference(mut self, reference: &ConversationReference) -> Self {
        self.channel_id = Some(reference.channel_id.clone());
        self.service_url = Some(reference.service_url.clone());
        self.conversation = Some(reference.conversation.clone());
        self.from = Some(reference.bot.clone());
        self.recipient = Some(reference.user.clone());
        if let Some(ref id) = reference.activity_id {
            self.reply_to_id = Some(id.clone());
        }
        if self.locale.is_none() {
            self.locale = reference.locale.clone();
        }
        self
    }

    /// Build the reference for the conversation this (inbound) activity came from.
    /// Returns None when the activity has no conversation id or service URL.
    pub fn conversation_reference(&self) -> Option<ConversationReference> {
        let conversation = self.conversation.clone().filter(|c| !c.id.trim().is_empty())?;
        let service_url = self
            .service_url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())?;
        Some(ConversationReference {
            channel_id: self.channel_id.clone().unwrap_or_default(),
            conversation,
            service_url,
            user: self.from.clone().unwrap_or_default(),
            bot: self.recipient.clone().unwrap_or_default(),
            activity_id: self.id.clone(),
            locale: self.locale.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_activity_maps_from_to_user_and_recipient_to_bot() {
        let json = r#"{
            "type": "message",
            "id": "act-1",
            "text": "hi",
            "channelId": "msteams",
            "serviceUrl": "https://smba.trafficmanager.net/emea/",
            "conversation": { "id": "a:conv1", "tenantId": "t1", "conversationType": "personal" },
            "from": { "id": "29:user", "name": "Ada", "aadObjectId": "00000000-0000-0000-0000-000000000001" },
            "recipient": { "id": "28:bot", "name": "Beacon" }
        }"#;
        let activity: Activity = serde_json::from_str(json).unwrap();
        let reference = activity.conversation_reference().unwrap();
        assert_eq!(reference.conversation_id(), "a:conv1");
        assert_eq!(reference.user.id, "29:user");
        assert_eq!(
            reference.external_user_id(),
            Some("00000000-0000-0000-0000-000000000001")
        );
        assert_eq!(reference.bot.id, "28:bot");
        assert_eq!(reference.activity_id.as_deref(), Some("act-1"));
        assert_eq!(reference.conversation.tenant_id.as_deref(), Some("t1"));
    }

    #[test]
    fn activity_without_conversation_has_no_reference() {
        let mut activity = Activity::text("hi");
        activity.service_url = Some("https://example.test/".to_string());
        assert!(activity.conversation_reference().is_none());

        activity.conversation = Some(ConversationAccount {
            id: "c1".to_string(),
            ..Default::default()
        });
        activity.service_url = Some("  ".to_string());
        assert!(activity.conversation_reference().is_none());
    }

    #[test]
    fn apply_reference_addresses_bot_to_user() {
        let reference = ConversationReference {
            channel_id: "msteams".to_string(),
            conversation: ConversationAccount {
                id: "c1".to_string(),
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
            activity_id: Some("a1".to_string()),
            locale: Some("en-US".to_string()),
        };
        let activity = Activity::text("hello").apply_reference(&reference);
        assert_eq!(activity.from.unwrap().id, "b1");
        assert_eq!(activity.recipient.unwrap().id, "u1");
        assert_eq!(activity.reply_to_id.as_deref(), Some("a1"));
        assert_eq!(activity.locale.as_deref(), Some("en-US"));

        let value = serde_json::to_value(Activity::text("x")).unwrap();
        assert_eq!(value["type"], "message");
        assert!(value.get("replyToId").is_none());
    }
}
