use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::domain::artifacts::artifact::{
    Artifact, ArtifactKind, ArtifactRelease, latest_release,
};
use crate::infrastructure::db::PgPool;

pub struct SqlxArtifactCatalog {
    pub pool: PgPool,
}

impl SqlxArtifactCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_artifact(row: &PgRow) -> anyhow::Result<Artifact> {
    let kind: String = row.get("kind");
    Ok(Artifact {
        id: row.get("id"),
        kind: kind.parse::<ArtifactKind>()?,
        slug: row.get("slug"),
        name: row.get("name"),
        is_external: row.get("is_external"),
    })
}

#[async_trait]
impl ArtifactCatalog for SqlxArtifactCatalog {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Artifact>> {
        let row = sqlx::query("SELECT id, kind, slug, name, is_external FROM artifacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_artifact).transpose()
    }

    async fn find_by_slug(
        &self,
        kind: ArtifactKind,
        slug: &str,
    ) -> anyhow::Result<Option<Artifact>> {
        let row = sqlx::query(
            "SELECT id, kind, slug, name, is_external FROM artifacts WHERE kind = $1 AND slug = $2",
        )
        .bind(kind.as_str())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_artifact).transpose()
    }

    async fn release(
        &self,
        artifact_id: Uuid,
        version: Option<&str>,
    ) -> anyhow::Result<Option<ArtifactRelease>> {
        let rows = sqlx::query(
            r#"SELECT artifact_id, version, file_url
               FROM artifact_releases
               WHERE artifact_id = $1 AND ($2::text IS NULL OR version = $2)"#,
        )
        .bind(artifact_id)
        .bind(version)
        .fetch_all(&self.pool)
        .await?;
        let releases: Vec<ArtifactRelease> = rows
            .into_iter()
            .map(|row| ArtifactRelease {
                artifact_id: row.get("artifact_id"),
                version: row.get("version"),
                file_url: row.get("file_url"),
            })
            .collect();
        // Version strings are free-form, so "latest" is decided in Rust rather than SQL.
        Ok(latest_release(&releases).cloned())
    }

    async fn register_external(
        &self,
        kind: ArtifactKind,
        slug: &str,
        name: &str,
    ) -> anyhow::Result<Artifact> {
        let row = sqlx::query(
            r#"INSERT INTO artifacts (id, kind, slug, name, is_external)
               VALUES ($1, $2, $3, $4, true)
               ON CONFLICT (kind, slug) DO UPDATE SET name = artifacts.name
               RETURNING id, kind, slug, name, is_external"#,
        )
        .bind(Uuid::new_v4())
        .bind(kind.as_str())
        .bind(slug)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        map_artifact(&row)
    }
}
