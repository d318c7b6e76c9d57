use crate::application::ports::activity_log::ActivityLog;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::site_repository::SiteRepository;
use crate::application::services::locks::AssociationLocks;
use crate::application::services::reconciler::{
    FoldResult, ReconcileError, StatusReconciler, StatusReport,
};
use crate::domain::sites::site::Site;

pub struct ReportCommandStatus<'a, A, C, S, L>
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

impl<'a, A, C, S, L> ReportCommandStatus<'a, A, C, S, L>
where
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    S: SiteRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    /// Folds an agent's report for an association of the already authenticated `site`.
    pub async fn execute(
        &self,
        site: &Site,
        report: &StatusReport,
    ) -> Result<FoldResult, ReconcileError> {
        report.transition()?;
        let target = self
            .associations
            .get(report.association_id)
            .await
            .map_err(ReconcileError::Load)?
            .ok_or(ReconcileError::NotFound)?;
        if target.site_id != site.id {
            return Err(ReconcileError::ForeignAssociation);
        }

        let _guard = self.locks.lock(site.id, target.artifact_id).await;
        let reconciler = StatusReconciler {
            associations: self.associations,
            catalog: self.catalog,
            sites: self.sites,
            activity: self.activity,
            locks: self.locks,
        };
        reconciler.fold_report(site, report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::commands::get_commands::GetSiteCommands;
    use crate::domain::artifacts::artifact::ArtifactKind;
    use crate::domain::associations::association::{ArtifactStatus, Association};
    use crate::domain::commands::command::ActionKind;
    use crate::test_support::{
        MemoryActivityLog, MemoryAssociations, MemoryCatalog, MemorySites, site,
    };
    use chrono::Utc;

    #[tokio::test]
    async fn pull_path_install_then_activate() {
        let s = site("k");
        let sites = MemorySites::new(vec![s.clone()]);
        let catalog = MemoryCatalog::new();
        let artifact = catalog.add(ArtifactKind::Plugin, "akismet", &["1.0", "2.0"]);
        let associations = MemoryAssociations::new();
        let activity = MemoryActivityLog::new();
        let locks = AssociationLocks::new();
        let assoc = associations.seed(Association::enabled(
            s.id,
            artifact.id,
            Some("2.0".into()),
            true,
            Utc::now(),
        ));
        let pull = GetSiteCommands {
            associations: &associations,
            catalog: &catalog,
        };
        let report = ReportCommandStatus {
            associations: &associations,
            catalog: &catalog,
            sites: &sites,
            activity: &activity,
            locks: &locks,
        };

        let commands = pull.execute(s.id).await.unwrap();
        assert_eq!(commands[0].action.kind(), ActionKind::Install);
        assert_eq!(commands[0].action.target_version(), Some("2.0"));

        report
            .execute(
                &s,
                &StatusReport {
                    association_id: assoc.id,
                    status: "installed".into(),
                    version: Some("2.0".into()),
                    error_message: None,
                    revision: Some(commands[0].revision),
                },
            )
            .await
            .unwrap();
        let commands = pull.execute(s.id).await.unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].action.kind(), ActionKind::Activate);

        report
            .execute(
                &s,
                &StatusReport {
                    association_id: assoc.id,
                    status: "active".into(),
                    version: None,
                    error_message: None,
                    revision: Some(commands[0].revision),
                },
            )
            .await
            .unwrap();
        assert!(pull.execute(s.id).await.unwrap().is_empty());
        let row = associations.snapshot(assoc.id).unwrap();
        assert_eq!(row.status, ArtifactStatus::Active);
        assert_eq!(row.installed_version.as_deref(), Some("2.0"));
    }

    #[tokio::test]
    async fn report_from_other_site_touches_nothing() {
        let owner = site("owner");
        let intruder = site("intruder");
        let sites = MemorySites::new(vec![owner.clone(), intruder.clone()]);
        let catalog = MemoryCatalog::new();
        let artifact = catalog.add(ArtifactKind::Plugin, "akismet", &["1.0"]);
        let associations = MemoryAssociations::new();
        let assoc = associations.seed(Association::enabled(
            owner.id,
            artifact.id,
            None,
            false,
            Utc::now(),
        ));
        let activity = MemoryActivityLog::new();
        let locks = AssociationLocks::new();
        let uc = ReportCommandStatus {
            associations: &associations,
            catalog: &catalog,
            sites: &sites,
            activity: &activity,
            locks: &locks,
        };
        let err = uc
            .execute(
                &intruder,
                &StatusReport {
                    association_id: assoc.id,
                    status: "uninstalled".into(),
                    version: None,
                    error_message: None,
                    revision: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ForeignAssociation));
        assert_eq!(associations.writes(), 0);
        assert!(activity.entries().is_empty());
    }
}
