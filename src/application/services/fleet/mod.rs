use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::application::dto::sync::{FleetReportDto, SiteSyncResultDto};
use crate::application::ports::activity_log::ActivityLog;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::connector_client::ConnectorClient;
use crate::application::ports::site_repository::SiteRepository;
use crate::application::services::locks::AssociationLocks;
use crate::application::use_cases::sync::sync_site::SyncSite;
use crate::domain::sites::site::Site;

/// Fleet-wide reconcile over a bounded worker pool, one result record per site.
#[derive(Clone)]
pub struct FleetSync {
    pub connector: Arc<dyn ConnectorClient>,
    pub associations: Arc<dyn AssociationRepository>,
    pub catalog: Arc<dyn ArtifactCatalog>,
    pub sites: Arc<dyn SiteRepository>,
    pub activity: Arc<dyn ActivityLog>,
    pub locks: AssociationLocks,
    pub concurrency: usize,
}

impl FleetSync {
    /// Cancelling stops dispatching further sites; syncs already running finish.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<FleetReportDto> {
        let sites = self.sites.list_all().await?;
        let mut report = FleetReportDto {
            total_sites: sites.len(),
            ..FleetReportDto::default()
        };
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut in_flight = FuturesUnordered::new();

        let mut pending = sites.into_iter();
        while let Some(site) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                report.cancelled = true;
                for skipped in std::iter::once(site).chain(pending.by_ref()) {
                    report.skipped_sites += 1;
                    report
                        .site_results
                        .push(not_dispatched(&skipped, "not dispatched: run cancelled"));
                }
                break;
            };
            let this = self.clone();
            let context = (site.id, site.name.clone());
            let handle = tokio::spawn(async move {
                let _permit = permit;
                this.sync_one(&site).await
            });
            in_flight.push(async move {
                match handle.await {
                    Ok(result) => result,
                    Err(err) => {
                        tracing::error!(site_id = %context.0, error = ?err, "site_sync_task_failed");
                        SiteSyncResultDto {
                            site_id: context.0,
                            site_name: context.1,
                            success: false,
                            error: Some("sync task aborted".to_string()),
                            wp_version: None,
                            listings: Vec::new(),
                        }
                    }
                }
            });
        }

        while let Some(result) = in_flight.next().await {
            if result.success {
                report.successful_sites += 1;
            } else {
                report.failed_sites += 1;
            }
            report.site_results.push(result);
        }

        tracing::info!(
            total = report.total_sites,
            successful = report.successful_sites,
            failed = report.failed_sites,
            skipped = report.skipped_sites,
            cancelled = report.cancelled,
            "fleet_sync_finished"
        );
        Ok(report)
    }

    async fn sync_one(&self, site: &Site) -> SiteSyncResultDto {
        let uc = SyncSite {
            connector: self.connector.as_ref(),
            associations: self.associations.as_ref(),
            catalog: self.catalog.as_ref(),
            sites: self.sites.as_ref(),
            activity: self.activity.as_ref(),
            locks: &self.locks,
        };
        uc.execute(site).await
    }
}

fn not_dispatched(site: &Site, reason: &str) -> SiteSyncResultDto {
    SiteSyncResultDto {
        site_id: site.id,
        site_name: site.name.clone(),
        success: false,
        error: Some(reason.to_string()),
        wp_version: None,
        listings: Vec::new(),
    }
}
