use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::association_repository::AssociationRepository;
use crate::domain::associations::association::{
    ArtifactStatus, Association, AssociationOrigin,
};
use crate::infrastructure::db::PgPool;

pub struct SqlxAssociationRepository {
    pub pool: PgPool,
}

impl SqlxAssociationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ASSOCIATION_COLUMNS: &str = "id, site_id, artifact_id, is_enabled, requested_version, \
     installed_version, is_active, status, origin, revision, last_error, last_sync, retired_at";

fn map_association(row: &PgRow) -> anyhow::Result<Association> {
    let status: String = row.get("status");
    let origin: String = row.get("origin");
    Ok(Association {
        id: row.get("id"),
        site_id: row.get("site_id"),
        artifact_id: row.get("artifact_id"),
        is_enabled: row.get("is_enabled"),
        requested_version: row.try_get("requested_version").ok().flatten(),
        installed_version: row.try_get("installed_version").ok().flatten(),
        is_active: row.get("is_active"),
        status: status.parse::<ArtifactStatus>()?,
        origin: origin.parse::<AssociationOrigin>()?,
        revision: row.get("revision"),
        last_error: row.try_get("last_error").ok().flatten(),
        last_sync: row.get("last_sync"),
        retired_at: row.try_get("retired_at").ok().flatten(),
    })
}

#[async_trait]
impl AssociationRepository for SqlxAssociationRepository {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Association>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM site_artifacts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_association).transpose()
    }

    async fn find(&self, site_id: Uuid, artifact_id: Uuid) -> anyhow::Result<Option<Association>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM site_artifacts WHERE site_id = $1 AND artifact_id = $2"
        ))
        .bind(site_id)
        .bind(artifact_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_association).transpose()
    }

    async fn list_for_site(&self, site_id: Uuid) -> anyhow::Result<Vec<Association>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM site_artifacts
             WHERE site_id = $1 AND retired_at IS NULL
             ORDER BY id"
        ))
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_association).collect()
    }

    async fn insert(&self, a: &Association) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO site_artifacts
               (id, site_id, artifact_id, is_enabled, requested_version, installed_version,
                is_active, status, origin, revision, last_error, last_sync, retired_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(a.id)
        .bind(a.site_id)
        .bind(a.artifact_id)
        .bind(a.is_enabled)
        .bind(a.requested_version.as_deref())
        .bind(a.installed_version.as_deref())
        .bind(a.is_active)
        .bind(a.status.as_str())
        .bind(a.origin.as_str())
        .bind(a.revision)
        .bind(a.last_error.as_deref())
        .bind(a.last_sync)
        .bind(a.retired_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, a: &Association, expected_revision: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"UPDATE site_artifacts
               SET is_enabled = $3,
                   requested_version = $4,
                   installed_version = $5,
                   is_active = $6,
                   status = $7,
                   origin = $8,
                   revision = $9,
                   last_error = $10,
                   last_sync = $11,
                   retired_at = $12
               WHERE id = $1 AND revision = $2"#,
        )
        .bind(a.id)
        .bind(expected_revision)
        .bind(a.is_enabled)
        .bind(a.requested_version.as_deref())
        .bind(a.installed_version.as_deref())
        .bind(a.is_active)
        .bind(a.status.as_str())
        .bind(a.origin.as_str())
        .bind(a.revision)
        .bind(a.last_error.as_deref())
        .bind(a.last_sync)
        .bind(a.retired_at)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("UPDATE site_artifacts SET last_sync = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
