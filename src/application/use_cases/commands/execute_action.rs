use uuid::Uuid;

use crate::application::diff::command_for;
use crate::application::ports::activity_log::ActivityLog;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::connector_client::ConnectorClient;
use crate::application::ports::site_repository::SiteRepository;
use crate::application::services::executor::{CommandExecutor, ExecutionOutcome};
use crate::application::services::locks::AssociationLocks;
use crate::application::services::reconciler::{FoldResult, ReconcileError, StatusReconciler};
use crate::application::use_cases::commands::helpers::track;
use crate::domain::commands::command::{ActionKind, Command, CommandAction};

#[derive(thiserror::Error, Debug)]
pub enum ExecuteActionError {
    #[error("site not found")]
    SiteNotFound,
    #[error("artifact is not enabled for this site")]
    AssociationNotFound,
    #[error("nothing to do for this artifact")]
    NothingToDo,
    #[error("no release available to {0}")]
    MissingRelease(ActionKind),
    #[error("failed to load execution state")]
    Load(#[source] anyhow::Error),
    #[error("failed to record execution result")]
    Reconcile(#[source] ReconcileError),
}

#[derive(Debug, Clone)]
pub struct ExecuteActionResult {
    pub action: ActionKind,
    pub outcome: ExecutionOutcome,
    pub fold: FoldResult,
}

pub struct ExecuteAction<'a, S, A, C, L, X>
where
    S: SiteRepository + ?Sized,
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    L: ActivityLog + ?Sized,
    X: ConnectorClient + ?Sized,
{
    pub sites: &'a S,
    pub associations: &'a A,
    pub catalog: &'a C,
    pub activity: &'a L,
    pub connector: &'a X,
    pub locks: &'a AssociationLocks,
}

impl<'a, S, A, C, L, X> ExecuteAction<'a, S, A, C, L, X>
where
    S: SiteRepository + ?Sized,
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    L: ActivityLog + ?Sized,
    X: ConnectorClient + ?Sized,
{
    /// Push path. Runs `action`, or whatever the diff says is outstanding when `None`, and
    /// folds the outcome while holding the association lock.
    pub async fn execute(
        &self,
        actor: &str,
        site_id: Uuid,
        artifact_id: Uuid,
        action: Option<ActionKind>,
    ) -> Result<ExecuteActionResult, ExecuteActionError> {
        let site = self
            .sites
            .get(site_id)
            .await
            .map_err(ExecuteActionError::Load)?
            .ok_or(ExecuteActionError::SiteNotFound)?;

        let _guard = self.locks.lock(site_id, artifact_id).await;
        let association = self
            .associations
            .find(site_id, artifact_id)
            .await
            .map_err(ExecuteActionError::Load)?
            .filter(|a| !a.is_retired())
            .ok_or(ExecuteActionError::AssociationNotFound)?;
        let tracked = track(self.catalog, association)
            .await
            .map_err(ExecuteActionError::Load)?
            .ok_or(ExecuteActionError::AssociationNotFound)?;

        let command = match action {
            None => command_for(&tracked, None).ok_or(ExecuteActionError::NothingToDo)?,
            Some(kind) => {
                let action = match kind {
                    ActionKind::Install | ActionKind::Update => {
                        let release = tracked
                            .release
                            .as_ref()
                            .ok_or(ExecuteActionError::MissingRelease(kind))?;
                        let (version, download_url) =
                            (release.version.clone(), release.file_url.clone());
                        if kind == ActionKind::Install {
                            CommandAction::Install {
                                version,
                                download_url,
                            }
                        } else {
                            CommandAction::Update {
                                version,
                                download_url,
                            }
                        }
                    }
                    ActionKind::Activate => CommandAction::Activate,
                    ActionKind::Deactivate => CommandAction::Deactivate,
                    ActionKind::Uninstall => CommandAction::Uninstall,
                };
                Command {
                    association_id: tracked.association.id,
                    site_id,
                    artifact_id,
                    kind: tracked.artifact.kind,
                    slug: tracked.artifact.slug.clone(),
                    revision: tracked.association.revision,
                    action,
                }
            }
        };

        let executor = CommandExecutor {
            connector: self.connector,
        };
        let outcome = executor.execute(&site, &command).await;

        let reconciler = StatusReconciler {
            associations: self.associations,
            catalog: self.catalog,
            sites: self.sites,
            activity: self.activity,
            locks: self.locks,
        };
        reconciler
            .record_connectivity(&site, outcome.reached, None)
            .await;
        let fold = reconciler
            .fold(
                &site,
                command.association_id,
                Some(command.revision),
                &outcome.transition,
                actor,
            )
            .await
            .map_err(ExecuteActionError::Reconcile)?;

        Ok(ExecuteActionResult {
            action: command.action.kind(),
            outcome,
            fold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::connector_client::ConnectorError;
    use crate::domain::artifacts::artifact::ArtifactKind;
    use crate::domain::artifacts::listing::RemoteListing;
    use crate::domain::associations::association::{ArtifactStatus, Association};
    use crate::domain::sites::site::ConnectionStatus;
    use crate::test_support::{
        MemoryActivityLog, MemoryAssociations, MemoryCatalog, MemorySites, ScriptedConnector,
        site,
    };
    use chrono::Utc;
    use std::time::Duration;

    struct Fixture {
        sites: MemorySites,
        associations: MemoryAssociations,
        catalog: MemoryCatalog,
        activity: MemoryActivityLog,
        connector: ScriptedConnector,
        locks: AssociationLocks,
    }

    impl Fixture {
        fn new(site: &crate::domain::sites::site::Site) -> Self {
            Self {
                sites: MemorySites::new(vec![site.clone()]),
                associations: MemoryAssociations::new(),
                catalog: MemoryCatalog::new(),
                activity: MemoryActivityLog::new(),
                connector: ScriptedConnector::new(),
                locks: AssociationLocks::new(),
            }
        }

        fn use_case(
            &self,
        ) -> ExecuteAction<
            '_,
            MemorySites,
            MemoryAssociations,
            MemoryCatalog,
            MemoryActivityLog,
            ScriptedConnector,
        > {
            ExecuteAction {
                sites: &self.sites,
                associations: &self.associations,
                catalog: &self.catalog,
                activity: &self.activity,
                connector: &self.connector,
                locks: &self.locks,
            }
        }
    }

    #[tokio::test]
    async fn diff_driven_install_is_folded() {
        let s = site("k");
        let fx = Fixture::new(&s);
        let artifact = fx.catalog.add(ArtifactKind::Plugin, "akismet", &["2.0"]);
        let assoc = fx.associations.seed(Association::enabled(
            s.id,
            artifact.id,
            Some("2.0".into()),
            false,
            Utc::now(),
        ));
        let res = fx
            .use_case()
            .execute("user:1", s.id, artifact.id, None)
            .await
            .unwrap();
        assert_eq!(res.action, ActionKind::Install);
        assert!(res.outcome.success);
        let row = fx.associations.snapshot(assoc.id).unwrap();
        assert_eq!(row.status, ArtifactStatus::Installed);
        assert_eq!(row.installed_version.as_deref(), Some("2.0"));
        assert!(!row.is_active);
        assert_eq!(
            fx.sites.snapshot(s.id).unwrap().connection_status,
            ConnectionStatus::Active
        );
    }

    #[tokio::test]
    async fn unreachable_site_marks_error_and_keeps_fields() {
        let s = site("k");
        let fx = Fixture::new(&s);
        let artifact = fx.catalog.add(ArtifactKind::Plugin, "akismet", &["2.0"]);
        let mut a = Association::enabled(s.id, artifact.id, None, false, Utc::now());
        a.installed_version = Some("2.0".into());
        a.status = ArtifactStatus::Inactive;
        let assoc = fx.associations.seed(a);
        fx.connector.fail("activate", ConnectorError::Timeout);
        let res = fx
            .use_case()
            .execute("user:1", s.id, artifact.id, Some(ActionKind::Activate))
            .await
            .unwrap();
        assert!(!res.outcome.success);
        let row = fx.associations.snapshot(assoc.id).unwrap();
        assert_eq!(row.status, ArtifactStatus::Error);
        assert_eq!(row.installed_version.as_deref(), Some("2.0"));
        assert!(!row.is_active);
        assert_eq!(
            fx.sites.snapshot(s.id).unwrap().connection_status,
            ConnectionStatus::Error
        );
    }

    #[tokio::test]
    async fn failed_update_install_clears_installation() {
        let s = site("k");
        let fx = Fixture::new(&s);
        let artifact = fx.catalog.add(ArtifactKind::Plugin, "akismet", &["1.0", "2.0"]);
        let mut a = Association::enabled(s.id, artifact.id, Some("2.0".into()), true, Utc::now());
        a.installed_version = Some("1.0".into());
        let assoc = fx.associations.seed(a);
        fx.connector.fail(
            "install",
            ConnectorError::Rejected {
                status: 500,
                message: "disk full".into(),
            },
        );
        let res = fx
            .use_case()
            .execute("user:1", s.id, artifact.id, None)
            .await
            .unwrap();
        assert_eq!(res.action, ActionKind::Update);
        assert!(!res.outcome.success);
        let row = fx.associations.snapshot(assoc.id).unwrap();
        assert_eq!(row.installed_version, None);
        assert_eq!(row.status, ArtifactStatus::Error);
        assert!(!row.is_active);
    }

    #[tokio::test]
    async fn listing_waits_for_an_update_in_progress() {
        let s = site("k");
        let fx = Fixture::new(&s);
        fx.connector.hold_invocations(Duration::from_millis(30));
        fx.connector.installs_version("akismet", "2.0");
        let artifact = fx.catalog.add(ArtifactKind::Plugin, "akismet", &["1.0", "2.0"]);
        let mut a = Association::enabled(s.id, artifact.id, Some("2.0".into()), true, Utc::now());
        a.installed_version = Some("1.0".into());
        let assoc = fx.associations.seed(a);

        let reconciler = StatusReconciler {
            associations: &fx.associations,
            catalog: &fx.catalog,
            sites: &fx.sites,
            activity: &fx.activity,
            locks: &fx.locks,
        };
        let use_case = fx.use_case();
        // The site is mid-update: uninstalled, new release not yet in place.
        let between_steps = RemoteListing::new(ArtifactKind::Plugin, vec![]);
        let (res, summary) = tokio::join!(
            use_case.execute("user:1", s.id, artifact.id, None),
            async {
                fx.connector.install_started().await;
                reconciler.reconcile_listing(&s, &between_steps).await
            }
        );

        let res = res.unwrap();
        assert_eq!(res.action, ActionKind::Update);
        assert!(res.outcome.success);
        let folded = match res.fold {
            FoldResult::Applied(row) => row,
            other => panic!("update result was discarded: {other:?}"),
        };
        assert_eq!(folded.id, assoc.id);
        assert_eq!(folded.status, ArtifactStatus::Active);
        assert_eq!(folded.installed_version.as_deref(), Some("2.0"));
        // The listing ran afterwards, against the folded row.
        assert_eq!(summary.unwrap().removed, 1);
    }

    #[tokio::test]
    async fn settled_association_has_nothing_to_do() {
        let s = site("k");
        let fx = Fixture::new(&s);
        let artifact = fx.catalog.add(ArtifactKind::Plugin, "akismet", &["2.0"]);
        let mut a = Association::enabled(s.id, artifact.id, None, true, Utc::now());
        a.installed_version = Some("2.0".into());
        a.status = ArtifactStatus::Active;
        fx.associations.seed(a);
        let err = fx
            .use_case()
            .execute("user:1", s.id, artifact.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteActionError::NothingToDo));
        assert!(fx.connector.calls().is_empty());
    }
}
