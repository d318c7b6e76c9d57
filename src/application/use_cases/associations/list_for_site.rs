use uuid::Uuid;

use super::AssociationChangeError;
use crate::application::dto::associations::AssociationDto;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::site_repository::SiteRepository;

pub struct ListSiteAssociations<'a, S, C, A>
where
    S: SiteRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub sites: &'a S,
    pub catalog: &'a C,
    pub associations: &'a A,
}

impl<'a, S, C, A> ListSiteAssociations<'a, S, C, A>
where
    S: SiteRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub async fn execute(&self, site_id: Uuid) -> Result<Vec<AssociationDto>, AssociationChangeError> {
        self.sites
            .get(site_id)
            .await
            .map_err(AssociationChangeError::Load)?
            .ok_or(AssociationChangeError::SiteNotFound)?;
        let rows = self
            .associations
            .list_for_site(site_id)
            .await
            .map_err(AssociationChangeError::Load)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match self
                .catalog
                .get(row.artifact_id)
                .await
                .map_err(AssociationChangeError::Load)?
            {
                Some(artifact) => out.push(AssociationDto::new(&row, &artifact)),
                None => {
                    tracing::warn!(association_id = %row.id, "association_artifact_missing");
                }
            }
        }
        out.sort_by(|a, b| (a.kind.as_str(), &a.slug).cmp(&(b.kind.as_str(), &b.slug)));
        Ok(out)
    }
}
