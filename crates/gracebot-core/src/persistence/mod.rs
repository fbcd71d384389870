//! Conversation history persistence.
//!
//! `PersistenceManager` converts activities with [`convert`] and hands the
//! resulting records to an [`ActivityStore`]. It holds no state of its own.

pub mod convert;
pub mod file_store;
pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{activity::Activity, Result};

pub use file_store::JsonFileStore;
pub use store::{ActivityStore, Committed, MemoryStore};

/// Storage-shaped projection of an [`Activity`].
///
/// Accounts are flattened into id/name columns; an account is present iff its
/// id column is set. The timestamp is RFC 3339 with nanoseconds and the
/// original UTC offset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityModel {
    pub id: String,
    pub activity_type: String,
    pub timestamp: String,

    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,

    #[serde(default)]
    pub from_id: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,

    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,

    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub conversation_name: Option<String>,
    #[serde(default)]
    pub conversation_is_group: Option<bool>,

    #[serde(default)]
    pub reply_to_id: Option<String>,
}

#[derive(Clone)]
pub struct PersistenceManager {
    store: Arc<dyn ActivityStore>,
}

impl PersistenceManager {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }

    /// Convert and durably store one activity.
    ///
    /// Returns only after the store's commit finished. A validation error means
    /// nothing was handed to the store.
    pub async fn add_activity(&self, activity: &Activity) -> Result<Committed> {
        let model = convert::to_model(activity)?;
        let id = model.id.clone();
        let committed = self.store.commit(vec![model]).await?;
        tracing::debug!(activity_id = %id, total = committed.total, "activity stored");
        Ok(committed)
    }

    /// Convert and store several activities in one all-or-nothing commit.
    pub async fn add_activities(&self, activities: &[Activity]) -> Result<Committed> {
        let models = activities
            .iter()
            .map(convert::to_model)
            .collect::<Result<Vec<_>>>()?;
        self.store.commit(models).await
    }

    /// The stored activity with identifier `id`, or `None` if there is none.
    pub async fn find_activity(&self, id: &str) -> Result<Option<Activity>> {
        let found = self
            .store
            .find_first(&|m: &ActivityModel| m.id == id)
            .await?;
        found.as_ref().map(convert::to_activity).transpose()
    }

    /// The first stored activity whose `reply_to_id` is `id`.
    pub async fn find_reply_to(&self, id: &str) -> Result<Option<Activity>> {
        let found = self
            .store
            .find_first(&|m: &ActivityModel| m.reply_to_id.as_deref() == Some(id))
            .await?;
        found.as_ref().map(convert::to_activity).transpose()
    }

    /// Every stored activity of a conversation, oldest first.
    pub async fn conversation_history(&self, conversation_id: &str) -> Result<Vec<Activity>> {
        self.store
            .find_all(&|m: &ActivityModel| m.conversation_id.as_deref() == Some(conversation_id))
            .await?
            .iter()
            .map(convert::to_activity)
            .collect()
    }
}
