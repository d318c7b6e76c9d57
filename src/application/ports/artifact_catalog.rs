use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::artifacts::artifact::{Artifact, ArtifactKind, ArtifactRelease};

#[async_trait]
pub trait ArtifactCatalog: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Artifact>>;

    async fn find_by_slug(&self, kind: ArtifactKind, slug: &str)
    -> anyhow::Result<Option<Artifact>>;

    /// A specific release, or the latest one when `version` is `None`.
    async fn release(
        &self,
        artifact_id: Uuid,
        version: Option<&str>,
    ) -> anyhow::Result<Option<ArtifactRelease>>;

    /// Registers an artifact first seen on a site. Idempotent per (kind, slug).
    async fn register_external(
        &self,
        kind: ArtifactKind,
        slug: &str,
        name: &str,
    ) -> anyhow::Result<Artifact>;
}
