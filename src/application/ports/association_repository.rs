use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::associations::association::Association;

#[async_trait]
pub trait AssociationRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Association>>;

    /// Looks up the pair including retired rows.
    async fn find(&self, site_id: Uuid, artifact_id: Uuid) -> anyhow::Result<Option<Association>>;

    /// Live (non-retired) associations of a site.
    async fn list_for_site(&self, site_id: Uuid) -> anyhow::Result<Vec<Association>>;

    async fn insert(&self, association: &Association) -> anyhow::Result<()>;

    /// Writes `association` only if the stored revision still equals `expected_revision`.
    /// Returns `false` when another writer got there first.
    async fn save(&self, association: &Association, expected_revision: i64)
    -> anyhow::Result<bool>;

    /// Advances `last_sync` without touching state or revision.
    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;
}
