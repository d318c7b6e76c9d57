use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::sites::site::{ConnectionStatus, Site};

#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Site>>;

    /// Every site whose shared secret equals `api_key`. Secrets are unique, so callers treat
    /// more than one row as a configuration error.
    async fn find_by_api_key(&self, api_key: &str) -> anyhow::Result<Vec<Site>>;

    async fn list_all(&self) -> anyhow::Result<Vec<Site>>;

    async fn record_connection(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        wp_version: Option<&str>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}
