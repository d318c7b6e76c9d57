use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::artifacts::artifact::{Artifact, ArtifactKind};
use crate::domain::associations::association::{Association, ArtifactStatus, AssociationOrigin};

#[derive(Debug, Clone)]
pub struct AssociationDto {
    pub id: Uuid,
    pub site_id: Uuid,
    pub artifact_id: Uuid,
    pub kind: ArtifactKind,
    pub slug: String,
    pub name: String,
    pub is_enabled: bool,
    pub requested_version: Option<String>,
    pub installed_version: Option<String>,
    /// Requested activation target while `status` is pending.
    pub is_active: bool,
    pub status: ArtifactStatus,
    pub origin: AssociationOrigin,
    pub revision: i64,
    pub last_error: Option<String>,
    pub last_sync: DateTime<Utc>,
}

impl AssociationDto {
    pub fn new(association: &Association, artifact: &Artifact) -> Self {
        Self {
            id: association.id,
            site_id: association.site_id,
            artifact_id: association.artifact_id,
            kind: artifact.kind,
            slug: artifact.slug.clone(),
            name: artifact.name.clone(),
            is_enabled: association.is_enabled,
            requested_version: association.requested_version.clone(),
            installed_version: association.installed_version.clone(),
            is_active: association.is_active,
            status: association.status,
            origin: association.origin,
            revision: association.revision,
            last_error: association.last_error.clone(),
            last_sync: association.last_sync,
        }
    }
}
