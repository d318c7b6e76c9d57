use chrono::Utc;
use uuid::Uuid;

use super::AssociationChangeError;
use crate::application::dto::associations::AssociationDto;
use crate::application::ports::activity_log::{ActivityEntry, ActivityLog};
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::site_repository::SiteRepository;
use crate::application::services::locks::AssociationLocks;
use crate::domain::associations::association::Association;

pub struct EnableForSite<'a, S, C, A, L>
where
    S: SiteRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    A: AssociationRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    pub sites: &'a S,
    pub catalog: &'a C,
    pub associations: &'a A,
    pub activity: &'a L,
    pub locks: &'a AssociationLocks,
}

impl<'a, S, C, A, L> EnableForSite<'a, S, C, A, L>
where
    S: SiteRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    A: AssociationRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    /// Creates the association, or re-enables an existing (possibly retired) one, as pending.
    pub async fn execute(
        &self,
        actor: &str,
        site_id: Uuid,
        artifact_id: Uuid,
        requested_version: Option<String>,
        activate: bool,
    ) -> Result<AssociationDto, AssociationChangeError> {
        self.sites
            .get(site_id)
            .await
            .map_err(AssociationChangeError::Load)?
            .ok_or(AssociationChangeError::SiteNotFound)?;
        let artifact = self
            .catalog
            .get(artifact_id)
            .await
            .map_err(AssociationChangeError::Load)?
            .ok_or(AssociationChangeError::ArtifactNotFound)?;
        if let Some(version) = requested_version.as_deref() {
            self.catalog
                .release(artifact_id, Some(version))
                .await
                .map_err(AssociationChangeError::Load)?
                .ok_or_else(|| AssociationChangeError::UnknownVersion(version.to_string()))?;
        }

        let _guard = self.locks.lock(site_id, artifact_id).await;
        let now = Utc::now();
        let existing = self
            .associations
            .find(site_id, artifact_id)
            .await
            .map_err(AssociationChangeError::Load)?;
        let association = match existing {
            None => {
                let created =
                    Association::enabled(site_id, artifact_id, requested_version, activate, now);
                self.associations
                    .insert(&created)
                    .await
                    .map_err(AssociationChangeError::Persist)?;
                created
            }
            Some(current) => {
                let next = current.reenabled(requested_version, activate, now);
                let saved = self
                    .associations
                    .save(&next, current.revision)
                    .await
                    .map_err(AssociationChangeError::Persist)?;
                if !saved {
                    return Err(AssociationChangeError::Conflict);
                }
                next
            }
        };

        let entry = ActivityEntry::by(actor, site_id, Some(association.id), "enabled")
            .with_details(format!(
                "{} requested={} active={}",
                artifact.slug,
                association.requested_version.as_deref().unwrap_or("latest"),
                association.is_active
            ));
        if let Err(err) = self.activity.record(&entry).await {
            tracing::warn!(error = ?err, "activity_log_write_failed");
        }
        Ok(AssociationDto::new(&association, &artifact))
    }
}
