use serde::Serialize;
use tokio::sync::broadcast;

use crate::store::Collection;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A document changed in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub document_id: String,
    pub user_id: String,
}

impl ChangeEvent {
    /// Channel name in the hosted store's realtime format.
    pub fn channel(&self, database_id: &str) -> String {
        format!(
            "databases.{}.collections.{}.documents.{}.{}",
            database_id,
            self.collection.as_str(),
            self.document_id,
            self.kind.as_str()
        )
    }

    /// Habit list changes of any kind and new completions invalidate derived streaks.
    pub fn requires_refresh(&self) -> bool {
        match self.collection {
            Collection::Habits => true,
            Collection::Completions => self.kind == ChangeKind::Create,
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Fire and forget; nobody listening is fine.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            collection = event.collection.as_str(),
            kind = event.kind.as_str(),
            document_id = %event.document_id,
            "Publishing change"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}
