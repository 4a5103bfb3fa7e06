//! Outbound side of the channel: connector client and continue-conversation adapter.
//!
//! The connector posts activities to a channel service URL with an app token; the adapter
//! turns a stored conversation reference plus a message producer into one such post.

mod adapter;
mod connector;

pub use adapter::{ConnectorAdapter, ConversationAdapter, MessageProducer, TextMessage};
pub use connector::{
    AppCredentials, ConnectorClient, ConversationsApi, TrustedServiceUrls, DEFAULT_OAUTH_SCOPE,
    DEFAULT_SERVICE_URL, DEFAULT_TOKEN_ENDPOINT,
};
