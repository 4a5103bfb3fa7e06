//! Conversation reference store: conversation id -> reference, shared by the inbound endpoint and the dispatcher.
//!
//! Created once at gateway startup and handed out as `Arc<ReferenceStore>`.
//! Readers get cloned snapshots, so a slow broadcast never holds the lock.

use crate::schema::{Activity, ConversationReference};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A reference plus when it was last written.
#[derive(Debug, Clone)]
pub struct StoredReference {
    pub reference: ConversationReference,
    pub updated_at: DateTime<Utc>,
}

/// In-memory store for conversation references (upsert, lookup, eviction).
pub struct ReferenceStore {
    inner: Arc<RwLock<HashMap<String, StoredReference>>>,
}

impl Default for ReferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace the reference for `id`.
    pub async fn upsert(&self, id: impl Into<String>, reference: ConversationReference) {
        self.upsert_at(id, reference, Utc::now()).await
    }

    pub(crate) async fn upsert_at(
        &self,
        id: impl Into<String>,
        reference: ConversationReference,
        at: DateTime<Utc>,
    ) {
        let stored = StoredReference {
            reference,
            updated_at: at,
        };
        self.inner.write().await.insert(id.into(), stored);
    }

    /// Record the conversation an inbound activity came from. Returns the conversation id when stored.
    pub async fn upsert_from_activity(&self, activity: &Activity) -> Option<String> {
        let reference = activity.conversation_reference()?;
        let id = reference.conversation_id().to_string();
        self.upsert(id.clone(), reference).await;
        Some(id)
    }

    /// Snapshot of every stored reference, in no particular order.
    pub async fn get_all(&self) -> Vec<ConversationReference> {
        self.inner
            .read()
            .await
            .values()
            .map(|s| s.reference.clone())
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<ConversationReference> {
        self.inner.read().await.get(id).map(|s| s.reference.clone())
    }

    /// First reference whose user carries this external identity-provider id.
    /// GUID ids compare by value (case and braces ignored); anything else is exact.
    pub async fn find_by_external_user(&self, external_user_id: &str) -> Option<ConversationReference> {
        let wanted = Uuid::parse_str(external_user_id).ok();
        self.inner
            .read()
            .await
            .values()
            .find(|s| match (s.reference.external_user_id(), wanted) {
                (Some(stored), Some(wanted)) => Uuid::parse_str(stored).ok() == Some(wanted),
                (Some(stored), None) => stored == external_user_id,
                (None, _) => false,
            })
            .map(|s| s.reference.clone())
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drop entries last written before `cutoff`. Returns how many were removed.
    pub async fn evict_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut g = self.inner.write().await;
        let before = g.len();
        g.retain(|_, s| s.updated_at >= cutoff);
        before - g.len()
    }

    /// Drop entries not refreshed within `max_age`.
    pub async fn evict_older_than(&self, max_age: std::time::Duration) -> usize {
        // Ages beyond chrono's range cannot have elapsed yet.
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return 0;
        };
        self.evict_before(cutoff).await
    }
}
