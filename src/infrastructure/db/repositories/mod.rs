pub mod activity_log_sqlx;
pub mod artifact_catalog_sqlx;
pub mod association_repository_sqlx;
pub mod site_repository_sqlx;
