use chrono::Utc;
use uuid::Uuid;

use super::AssociationChangeError;
use crate::application::dto::associations::AssociationDto;
use crate::application::ports::activity_log::{ActivityEntry, ActivityLog};
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::services::locks::AssociationLocks;

pub struct DisableForSite<'a, C, A, L>
where
    C: ArtifactCatalog + ?Sized,
    A: AssociationRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    pub catalog: &'a C,
    pub associations: &'a A,
    pub activity: &'a L,
    pub locks: &'a AssociationLocks,
}

impl<'a, C, A, L> DisableForSite<'a, C, A, L>
where
    C: ArtifactCatalog + ?Sized,
    A: AssociationRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    pub async fn execute(
        &self,
        actor: &str,
        site_id: Uuid,
        artifact_id: Uuid,
    ) -> Result<AssociationDto, AssociationChangeError> {
        let artifact = self
            .catalog
            .get(artifact_id)
            .await
            .map_err(AssociationChangeError::Load)?
            .ok_or(AssociationChangeError::ArtifactNotFound)?;

        let _guard = self.locks.lock(site_id, artifact_id).await;
        let current = self
            .associations
            .find(site_id, artifact_id)
            .await
            .map_err(AssociationChangeError::Load)?
            .ok_or(AssociationChangeError::AssociationNotFound)?;
        if current.is_retired() {
            return Ok(AssociationDto::new(&current, &artifact));
        }

        let next = current.disabled(Utc::now());
        let saved = self
            .associations
            .save(&next, current.revision)
            .await
            .map_err(AssociationChangeError::Persist)?;
        if !saved {
            return Err(AssociationChangeError::Conflict);
        }

        let action = if next.is_retired() { "retired" } else { "disabled" };
        let entry = ActivityEntry::by(actor, site_id, Some(next.id), action)
            .with_details(artifact.slug.clone());
        if let Err(err) = self.activity.record(&entry).await {
            tracing::warn!(error = ?err, "activity_log_write_failed");
        }
        Ok(AssociationDto::new(&next, &artifact))
    }
}
