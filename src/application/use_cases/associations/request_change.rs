use chrono::Utc;
use uuid::Uuid;

use super::AssociationChangeError;
use crate::application::dto::associations::AssociationDto;
use crate::application::ports::activity_log::{ActivityEntry, ActivityLog};
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::services::locks::AssociationLocks;

pub struct RequestChange<'a, C, A, L>
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

impl<'a, C, A, L> RequestChange<'a, C, A, L>
where
    C: ArtifactCatalog + ?Sized,
    A: AssociationRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    /// Marks the association pending with an optional new version and activation target.
    /// With neither given it only forces a fresh diff, which is how errored rows are retried.
    pub async fn execute(
        &self,
        actor: &str,
        site_id: Uuid,
        artifact_id: Uuid,
        version: Option<String>,
        active: Option<bool>,
    ) -> Result<AssociationDto, AssociationChangeError> {
        let artifact = self
            .catalog
            .get(artifact_id)
            .await
            .map_err(AssociationChangeError::Load)?
            .ok_or(AssociationChangeError::ArtifactNotFound)?;
        if let Some(v) = version.as_deref() {
            self.catalog
                .release(artifact_id, Some(v))
                .await
                .map_err(AssociationChangeError::Load)?
                .ok_or_else(|| AssociationChangeError::UnknownVersion(v.to_string()))?;
        }

        let _guard = self.locks.lock(site_id, artifact_id).await;
        let current = self
            .associations
            .find(site_id, artifact_id)
            .await
            .map_err(AssociationChangeError::Load)?
            .filter(|a| !a.is_retired())
            .ok_or(AssociationChangeError::AssociationNotFound)?;
        if !current.is_enabled {
            return Err(AssociationChangeError::Disabled);
        }

        let next = current.requested(version.map(Some), active, Utc::now());
        let saved = self
            .associations
            .save(&next, current.revision)
            .await
            .map_err(AssociationChangeError::Persist)?;
        if !saved {
            return Err(AssociationChangeError::Conflict);
        }

        let entry = ActivityEntry::by(actor, site_id, Some(next.id), "requested").with_details(
            format!(
                "{} version={} active={}",
                artifact.slug,
                next.requested_version.as_deref().unwrap_or("latest"),
                next.is_active
            ),
        );
        if let Err(err) = self.activity.record(&entry).await {
            tracing::warn!(error = ?err, "activity_log_write_failed");
        }
        Ok(AssociationDto::new(&next, &artifact))
    }
}
