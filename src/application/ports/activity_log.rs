use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub actor: String,
    pub site_id: Uuid,
    pub association_id: Option<Uuid>,
    pub action: String,
    pub details: Option<String>,
}

impl ActivityEntry {
    pub fn system(site_id: Uuid, association_id: Option<Uuid>, action: impl Into<String>) -> Self {
        Self::by("system", site_id, association_id, action)
    }

    pub fn by(
        actor: impl Into<String>,
        site_id: Uuid,
        association_id: Option<Uuid>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            site_id,
            association_id,
            action: action.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, entry: &ActivityEntry) -> anyhow::Result<()>;
}
