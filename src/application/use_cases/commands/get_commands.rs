use uuid::Uuid;

use crate::application::diff::compute_commands;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::use_cases::commands::helpers::load_tracked_artifacts;
use crate::domain::commands::command::Command;

pub struct GetSiteCommands<'a, A, C>
where
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
{
    pub associations: &'a A,
    pub catalog: &'a C,
}

impl<'a, A, C> GetSiteCommands<'a, A, C>
where
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
{
    /// Outstanding commands for the site. Reads only; calling it repeatedly is harmless.
    pub async fn execute(&self, site_id: Uuid) -> anyhow::Result<Vec<Command>> {
        let rows = self.associations.list_for_site(site_id).await?;
        let tracked = load_tracked_artifacts(self.catalog, rows).await?;
        let mut commands = compute_commands(&tracked, None);
        commands.sort_by(|a, b| {
            (a.kind.as_str(), a.slug.as_str()).cmp(&(b.kind.as_str(), b.slug.as_str()))
        });
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifacts::artifact::ArtifactKind;
    use crate::domain::associations::association::{ArtifactStatus, Association};
    use crate::domain::commands::command::{ActionKind, CommandAction};
    use crate::test_support::{MemoryAssociations, MemoryCatalog};
    use chrono::Utc;

    #[tokio::test]
    async fn pending_install_uses_latest_release_when_unpinned() {
        let catalog = MemoryCatalog::new();
        let artifact = catalog.add(ArtifactKind::Plugin, "akismet", &["5.2.0", "5.10.0"]);
        let associations = MemoryAssociations::new();
        let site_id = Uuid::new_v4();
        associations.seed(Association::enabled(site_id, artifact.id, None, true, Utc::now()));
        let uc = GetSiteCommands {
            associations: &associations,
            catalog: &catalog,
        };
        let commands = uc.execute(site_id).await.unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].action,
            CommandAction::Install {
                version: "5.10.0".into(),
                download_url: "https://files.example.test/akismet-5.10.0.zip".into(),
            }
        );
    }

    #[tokio::test]
    async fn settled_site_has_no_commands() {
        let catalog = MemoryCatalog::new();
        let artifact = catalog.add(ArtifactKind::Theme, "astra", &["4.0"]);
        let associations = MemoryAssociations::new();
        let site_id = Uuid::new_v4();
        let mut a = Association::enabled(site_id, artifact.id, None, true, Utc::now());
        a.installed_version = Some("4.0".into());
        a.status = ArtifactStatus::Active;
        associations.seed(a);
        let uc = GetSiteCommands {
            associations: &associations,
            catalog: &catalog,
        };
        assert!(uc.execute(site_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_artifact_is_uninstalled_first() {
        let catalog = MemoryCatalog::new();
        let artifact = catalog.add(ArtifactKind::Plugin, "jetpack", &["13.0", "14.0"]);
        let associations = MemoryAssociations::new();
        let site_id = Uuid::new_v4();
        let mut a = Association::enabled(site_id, artifact.id, Some("14.0".into()), true, Utc::now());
        a.installed_version = Some("13.0".into());
        associations.seed(a.disabled(Utc::now()));
        let uc = GetSiteCommands {
            associations: &associations,
            catalog: &catalog,
        };
        let commands = uc.execute(site_id).await.unwrap();
        assert_eq!(commands[0].action.kind(), ActionKind::Uninstall);
    }
}
