use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{errors::Error, persistence::ActivityModel, Result};

/// Result of a successful commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Committed {
    /// Records made durable by this commit.
    pub records: usize,
    /// Records in the store after the commit.
    pub total: usize,
}

pub type ModelPredicate<'a> = &'a (dyn Fn(&ActivityModel) -> bool + Send + Sync);

/// Record store port for activity history.
///
/// `commit` is all-or-nothing: either every staged record becomes visible to
/// readers or none does. Identifiers are unique across the store.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn commit(&self, staged: Vec<ActivityModel>) -> Result<Committed>;

    /// First record matching `predicate`, in insertion order.
    async fn find_first(&self, predicate: ModelPredicate<'_>) -> Result<Option<ActivityModel>>;

    /// All records matching `predicate`, in insertion order.
    async fn find_all(&self, predicate: ModelPredicate<'_>) -> Result<Vec<ActivityModel>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Ordered records plus an id index. Shared by the store implementations.
#[derive(Debug, Default)]
pub(crate) struct Records {
    items: Vec<ActivityModel>,
    ids: HashSet<String>,
}

impl Records {
    /// Reject a batch that repeats an id, either internally or against stored records.
    pub(crate) fn check_batch(&self, batch: &[ActivityModel]) -> Result<()> {
        let mut seen = HashSet::with_capacity(batch.len());
        for m in batch {
            if self.ids.contains(&m.id) || !seen.insert(m.id.as_str()) {
                return Err(Error::DuplicateActivity(m.id.clone()));
            }
        }
        Ok(())
    }

    pub(crate) fn extend(&mut self, batch: Vec<ActivityModel>) {
        for m in batch {
            self.ids.insert(m.id.clone());
            self.items.push(m);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ActivityModel> {
        self.items.iter()
    }

    pub(crate) fn find_first(&self, predicate: ModelPredicate<'_>) -> Option<ActivityModel> {
        self.items.iter().find(|m| predicate(*m)).cloned()
    }

    pub(crate) fn find_all(&self, predicate: ModelPredicate<'_>) -> Vec<ActivityModel> {
        self.items.iter().filter(|m| predicate(*m)).cloned().collect()
    }
}

/// In-memory storage for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn commit(&self, staged: Vec<ActivityModel>) -> Result<Committed> {
        let mut records = self.records.write().await;
        records.check_batch(&staged)?;
        let n = staged.len();
        records.extend(staged);
        Ok(Committed {
            records: n,
            total: records.len(),
        })
    }

    async fn find_first(&self, predicate: ModelPredicate<'_>) -> Result<Option<ActivityModel>> {
        Ok(self.records.read().await.find_first(predicate))
    }

    async fn find_all(&self, predicate: ModelPredicate<'_>) -> Result<Vec<ActivityModel>> {
        Ok(self.records.read().await.find_all(predicate))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
