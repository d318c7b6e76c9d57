use async_trait::async_trait;

use crate::application::ports::activity_log::{ActivityEntry, ActivityLog};
use crate::infrastructure::db::PgPool;

pub struct SqlxActivityLog {
    pub pool: PgPool,
}

impl SqlxActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLog for SqlxActivityLog {
    async fn record(&self, entry: &ActivityEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO activity_logs (actor, site_id, association_id, action, details)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&entry.actor)
        .bind(entry.site_id)
        .bind(entry.association_id)
        .bind(&entry.action)
        .bind(entry.details.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
