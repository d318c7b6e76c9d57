use chrono::Utc;

use crate::application::dto::sync::ConnectionTestDto;
use crate::application::ports::activity_log::{ActivityEntry, ActivityLog};
use crate::application::ports::connector_client::ConnectorClient;
use crate::application::ports::site_repository::SiteRepository;
use crate::domain::sites::site::{ConnectionStatus, Site};

pub struct TestConnection<'a, X, S, L>
where
    X: ConnectorClient + ?Sized,
    S: SiteRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    pub connector: &'a X,
    pub sites: &'a S,
    pub activity: &'a L,
}

impl<'a, X, S, L> TestConnection<'a, X, S, L>
where
    X: ConnectorClient + ?Sized,
    S: SiteRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    pub async fn execute(&self, actor: &str, site: &Site) -> anyhow::Result<ConnectionTestDto> {
        let (status, dto) = match self.connector.ping(site).await {
            Ok(reply) => (
                ConnectionStatus::Active,
                ConnectionTestDto {
                    site_id: site.id,
                    success: true,
                    message: reply.message,
                    wp_version: reply.wp_version,
                },
            ),
            Err(err) => {
                tracing::info!(site_id = %site.id, error = %err, "site_ping_failed");
                (
                    ConnectionStatus::Error,
                    ConnectionTestDto {
                        site_id: site.id,
                        success: false,
                        message: Some(err.to_string()),
                        wp_version: None,
                    },
                )
            }
        };
        self.sites
            .record_connection(site.id, status, dto.wp_version.as_deref(), Utc::now())
            .await?;
        let entry = ActivityEntry::by(actor, site.id, None, "connection_tested")
            .with_details(status.as_str());
        if let Err(err) = self.activity.record(&entry).await {
            tracing::warn!(error = ?err, "activity_log_write_failed");
        }
        Ok(dto)
    }
}
