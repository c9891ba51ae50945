//! Notification history store interface and in-memory implementation

use crate::{NotificationRecord, PushError};
use async_trait::async_trait;

/// Notification history store interface
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Appends one history row
    async fn insert(&self, record: NotificationRecord) -> Result<(), PushError>;

    /// Lists history rows, newest first
    async fn list(&self) -> Result<Vec<NotificationRecord>, PushError>;
}

/// In-memory implementation of NotificationStore
pub struct InMemoryNotificationStore {
    records: std::sync::Arc<tokio::sync::RwLock<Vec<NotificationRecord>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            records: std::sync::Arc::new(tokio::sync::RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, record: NotificationRecord) -> Result<(), PushError> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<NotificationRecord>, PushError> {
        let records = self.records.read().await;
        let mut listed = records.clone();
        // stable sort keeps insertion order for equal timestamps, so reverse first
        listed.reverse();
        listed.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutgoingNotification;
    use chrono::Duration;

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = InMemoryNotificationStore::new();

        let mut older = NotificationRecord::from_outgoing(&OutgoingNotification::new("first", "one"));
        older.sent_at = older.sent_at - Duration::minutes(5);
        let newer = NotificationRecord::from_outgoing(&OutgoingNotification::new("second", "two"));

        store.insert(older).await.unwrap();
        store.insert(newer).await.unwrap();

        let titles: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["second".to_string(), "first".to_string()]);
    }
}
