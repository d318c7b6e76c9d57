use crate::application::diff::TrackedArtifact;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::domain::associations::association::Association;

/// Joins an association with its artifact and target release.
/// `None` when the artifact is gone from the catalog.
pub async fn track<C>(catalog: &C, association: Association) -> anyhow::Result<Option<TrackedArtifact>>
where
    C: ArtifactCatalog + ?Sized,
{
    let Some(artifact) = catalog.get(association.artifact_id).await? else {
        tracing::warn!(
            association_id = %association.id,
            artifact_id = %association.artifact_id,
            "association_artifact_missing"
        );
        return Ok(None);
    };
    let release = catalog
        .release(artifact.id, association.requested_version.as_deref())
        .await?;
    Ok(Some(TrackedArtifact {
        association,
        artifact,
        release,
    }))
}

pub async fn load_tracked_artifacts<C>(
    catalog: &C,
    associations: Vec<Association>,
) -> anyhow::Result<Vec<TrackedArtifact>>
where
    C: ArtifactCatalog + ?Sized,
{
    let mut out = Vec::with_capacity(associations.len());
    for association in associations {
        if let Some(item) = track(catalog, association).await? {
            out.push(item);
        }
    }
    Ok(out)
}
