use crate::application::dto::sync::SiteSyncResultDto;
use crate::application::ports::activity_log::ActivityLog;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::connector_client::ConnectorClient;
use crate::application::ports::site_repository::SiteRepository;
use crate::application::services::locks::AssociationLocks;
use crate::application::services::reconciler::StatusReconciler;
use crate::domain::artifacts::artifact::ArtifactKind;
use crate::domain::sites::site::Site;

pub struct SyncSite<'a, X, A, C, S, L>
where
    X: ConnectorClient + ?Sized,
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    S: SiteRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    pub connector: &'a X,
    pub associations: &'a A,
    pub catalog: &'a C,
    pub sites: &'a S,
    pub activity: &'a L,
    pub locks: &'a AssociationLocks,
}

impl<'a, X, A, C, S, L> SyncSite<'a, X, A, C, S, L>
where
    X: ConnectorClient + ?Sized,
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    S: SiteRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    /// Pulls the plugin and theme inventories and reconciles each. Failures are reported in
    /// the result rather than returned, so one site never aborts a fleet run.
    pub async fn execute(&self, site: &Site) -> SiteSyncResultDto {
        let reconciler = StatusReconciler {
            associations: self.associations,
            catalog: self.catalog,
            sites: self.sites,
            activity: self.activity,
            locks: self.locks,
        };
        let mut result = SiteSyncResultDto {
            site_id: site.id,
            site_name: site.name.clone(),
            success: true,
            error: None,
            wp_version: None,
            listings: Vec::new(),
        };
        let mut errors: Vec<String> = Vec::new();
        let mut reached = false;

        for kind in ArtifactKind::ALL {
            let listing = match self.connector.list_installed(site, kind).await {
                Ok(listing) => {
                    reached = true;
                    listing
                }
                Err(err) => {
                    tracing::warn!(
                        site_id = %site.id,
                        kind = kind.as_str(),
                        error = %err,
                        "site_listing_failed"
                    );
                    reached |= !err.is_connectivity();
                    errors.push(format!("{kind}: {err}"));
                    if err.is_connectivity() {
                        break;
                    }
                    continue;
                }
            };
            match reconciler.reconcile_listing(site, &listing).await {
                Ok(summary) => result.listings.push(summary),
                Err(err) => {
                    tracing::error!(
                        site_id = %site.id,
                        kind = kind.as_str(),
                        error = ?err,
                        "site_reconcile_failed"
                    );
                    errors.push(format!("{kind}: {err}"));
                }
            }
        }

        reconciler.record_connectivity(site, reached, None).await;
        if !errors.is_empty() {
            result.success = false;
            result.error = Some(errors.join("; "));
        }
        result
    }
}
