use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::application::ports::activity_log::{ActivityEntry, ActivityLog};

/// An activity entry as pushed to live subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileEvent {
    #[serde(flatten)]
    pub entry: ActivityEntry,
    pub at: DateTime<Utc>,
}

/// Writes through to the durable log, then fans the entry out to subscribers.
#[derive(Clone)]
pub struct BroadcastActivityLog {
    inner: Arc<dyn ActivityLog>,
    sender: broadcast::Sender<ReconcileEvent>,
}

impl BroadcastActivityLog {
    pub fn new(inner: Arc<dyn ActivityLog>, sender: broadcast::Sender<ReconcileEvent>) -> Self {
        Self { inner, sender }
    }
}

#[async_trait]
impl ActivityLog for BroadcastActivityLog {
    async fn record(&self, entry: &ActivityEntry) -> anyhow::Result<()> {
        self.inner.record(entry).await?;
        let event = ReconcileEvent {
            entry: entry.clone(),
            at: Utc::now(),
        };
        match self.sender.send(event) {
            Ok(_) => Ok(()),
            // Nobody listening.
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryActivityLog;
    use uuid::Uuid;

    #[tokio::test]
    async fn records_then_publishes() {
        let durable = Arc::new(MemoryActivityLog::new());
        let (tx, mut rx) = broadcast::channel(8);
        let log = BroadcastActivityLog::new(durable.clone(), tx);
        let site_id = Uuid::new_v4();
        log.record(&ActivityEntry::system(site_id, None, "connection_tested"))
            .await
            .unwrap();
        assert_eq!(durable.actions(), vec!["connection_tested".to_string()]);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.entry.site_id, site_id);
        assert_eq!(event.entry.action, "connection_tested");
    }

    #[tokio::test]
    async fn missing_subscribers_are_not_an_error() {
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let log = BroadcastActivityLog::new(Arc::new(MemoryActivityLog::new()), tx);
        let entry = ActivityEntry::by("user:1", Uuid::new_v4(), None, "enabled");
        assert!(log.record(&entry).await.is_ok());
    }
}
