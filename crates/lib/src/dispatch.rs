//! Proactive dispatch over the reference store: broadcast to everyone or target one user.
//!
//! Each resume is independent. A failure is recorded in the outcome for that conversation
//! and never stops delivery to the others.

use crate::channels::{ConversationAdapter, MessageProducer};
use crate::error::SendError;
use crate::references::ReferenceStore;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;

pub const DEFAULT_BROADCAST_CONCURRENCY: usize = 8;

/// Result of resuming one conversation during a broadcast.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub conversation_id: String,
    pub result: Result<(), SendError>,
}

/// Per-conversation outcomes of one broadcast.
#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    pub outcomes: Vec<DispatchOutcome>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SendError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.conversation_id.as_str(), e)))
    }
}

/// Outcome of dispatching to a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDispatch {
    /// No stored conversation carries that user id.
    NotFound,
    Sent { conversation_id: String },
    Failed {
        conversation_id: String,
        error: SendError,
    },
}

impl UserDispatch {
    pub fn found(&self) -> bool {
        !matches!(self, UserDispatch::NotFound)
    }
}

/// Orchestrates resumes through the adapter. Performs no I/O of its own.
pub struct Dispatcher {
    store: Arc<ReferenceStore>,
    adapter: Arc<dyn ConversationAdapter>,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(store: Arc<ReferenceStore>, adapter: Arc<dyn ConversationAdapter>) -> Self {
        Self {
            store,
            adapter,
            concurrency: DEFAULT_BROADCAST_CONCURRENCY,
        }
    }

    /// Maximum resumes in flight during a broadcast (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<ReferenceStore> {
        &self.store
    }

    /// Resume every stored conversation once and send what `producer` builds.
    /// Works on a snapshot of the store; references added mid-broadcast are not included.
    pub async fn broadcast_proactive(&self, producer: &dyn MessageProducer) -> BroadcastReport {
        let references = self.store.get_all().await;
        log::debug!("broadcast: resuming {} conversation(s)", references.len());
        let adapter = &self.adapter;
        let outcomes: Vec<DispatchOutcome> = stream::iter(references)
            .map(|reference| async move {
                let result = adapter.continue_conversation(&reference, producer).await;
                DispatchOutcome {
                    conversation_id: reference.conversation_id().to_string(),
                    result,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        let report = BroadcastReport { outcomes };
        for (id, e) in report.failures() {
            log::warn!("broadcast to {} failed ({}): {}", id, e.kind(), e);
        }
        log::info!(
            "broadcast finished: {}/{} delivered",
            report.succeeded(),
            report.attempted()
        );
        report
    }

    /// Resume only the conversation whose user has this external id.
    pub async fn dispatch_to_user(
        &self,
        external_user_id: &str,
        producer: &dyn MessageProducer,
    ) -> UserDispatch {
        let Some(reference) = self.store.find_by_external_user(external_user_id).await else {
            log::debug!("dispatch: no conversation for user {}", external_user_id);
            return UserDispatch::NotFound;
        };
        let conversation_id = reference.conversation_id().to_string();
        match self.adapter.continue_conversation(&reference, producer).await {
            Ok(()) => UserDispatch::Sent { conversation_id },
            Err(error) => {
                log::warn!(
                    "dispatch to user {} in {} failed ({}): {}",
                    external_user_id,
                    conversation_id,
                    error.kind(),
                    error
                );
                UserDispatch::Failed {
                    conversation_id,
                    error,
                }
            }
        }
    }
}
