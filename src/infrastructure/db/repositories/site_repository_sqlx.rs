use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::application::ports::site_repository::SiteRepository;
use crate::domain::sites::site::{ConnectionStatus, Site};
use crate::infrastructure::db::PgPool;

pub struct SqlxSiteRepository {
    pub pool: PgPool,
}

impl SqlxSiteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SITE_COLUMNS: &str =
    "id, name, base_url, api_key, connection_status, last_connection, wp_version";

fn map_site(row: &PgRow) -> anyhow::Result<Site> {
    let status: String = row.get("connection_status");
    Ok(Site {
        id: row.get("id"),
        name: row.get("name"),
        base_url: row.get("base_url"),
        api_key: row.get("api_key"),
        connection_status: status.parse::<ConnectionStatus>()?,
        last_connection: row.try_get("last_connection").ok().flatten(),
        wp_version: row.try_get("wp_version").ok().flatten(),
    })
}

#[async_trait]
impl SiteRepository for SqlxSiteRepository {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Site>> {
        let row = sqlx::query(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_site).transpose()
    }

    async fn find_by_api_key(&self, api_key: &str) -> anyhow::Result<Vec<Site>> {
        let rows = sqlx::query(&format!(
            "SELECT {SITE_COLUMNS} FROM sites WHERE api_key = $1 LIMIT 2"
        ))
        .bind(api_key)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_site).collect()
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Site>> {
        let rows = sqlx::query(&format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_site).collect()
    }

    async fn record_connection(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        wp_version: Option<&str>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"UPDATE sites
               SET connection_status = $2,
                   last_connection = $3,
                   wp_version = COALESCE($4, wp_version)
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(at)
        .bind(wp_version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
