use crate::application::ports::activity_log::ActivityLog;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::site_repository::SiteRepository;
use crate::application::services::locks::AssociationLocks;
use crate::application::services::reconciler::{
    ListingSummary, ReconcileError, StatusReconciler,
};
use crate::domain::artifacts::listing::RemoteListing;
use crate::domain::sites::site::Site;

/// Inventory pushed by the agent itself (`syncSiteData`).
pub struct ApplyReportedListing<'a, A, C, S, L>
where
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    S: SiteRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    pub associations: &'a A,
    pub catalog: &'a C,
    pub sites: &'a S,
    pub activity: &'a L,
    pub locks: &'a AssociationLocks,
}

impl<'a, A, C, S, L> ApplyReportedListing<'a, A, C, S, L>
where
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    S: SiteRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    pub async fn execute(
        &self,
        site: &Site,
        wp_version: Option<&str>,
        listings: &[RemoteListing],
    ) -> Result<Vec<ListingSummary>, ReconcileError> {
        let reconciler = StatusReconciler {
            associations: self.associations,
            catalog: self.catalog,
            sites: self.sites,
            activity: self.activity,
            locks: self.locks,
        };
        reconciler.record_connectivity(site, true, wp_version).await;
        let mut out = Vec::with_capacity(listings.len());
        for listing in listings {
            out.push(reconciler.reconcile_listing(site, listing).await?);
        }
        Ok(out)
    }
}
