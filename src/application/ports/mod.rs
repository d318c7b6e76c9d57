pub mod activity_log;
pub mod artifact_catalog;
pub mod association_repository;
pub mod connector_client;
pub mod site_repository;
