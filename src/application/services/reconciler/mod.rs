use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::ports::activity_log::{ActivityEntry, ActivityLog};
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::site_repository::SiteRepository;
use crate::application::services::locks::AssociationLocks;
use crate::domain::artifacts::artifact::ArtifactKind;
use crate::domain::artifacts::listing::RemoteListing;
use crate::domain::associations::association::{Association, Transition};
use crate::domain::sites::site::{ConnectionStatus, Site};

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("association not found")]
    NotFound,
    #[error("association belongs to another site")]
    ForeignAssociation,
    #[error("unknown reported status: {0}")]
    UnknownStatus(String),
    #[error("failed to load reconciliation state")]
    Load(#[source] anyhow::Error),
    #[error("failed to persist reconciliation result")]
    Persist(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldResult {
    Applied(Association),
    /// Dropped because the stored association moved past the revision the outcome was based on.
    Stale { stored_revision: i64 },
}

/// Status report sent by an agent after executing a pulled command.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub association_id: Uuid,
    pub status: String,
    pub version: Option<String>,
    pub error_message: Option<String>,
    pub revision: Option<i64>,
}

impl StatusReport {
    pub fn transition(&self) -> Result<Transition, ReconcileError> {
        Ok(match self.status.as_str() {
            "installed" => Transition::Installed {
                version: self.version.clone(),
            },
            "active" => Transition::Activated {
                version: self.version.clone(),
            },
            "inactive" => Transition::Deactivated,
            "uninstalled" => Transition::Uninstalled,
            "error" => Transition::Failed {
                message: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "agent reported an error".to_string()),
            },
            other => return Err(ReconcileError::UnknownStatus(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ListingSummary {
    pub kind: Option<ArtifactKind>,
    pub discovered: usize,
    pub revived: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

enum Observation {
    Unchanged,
    Changed,
    Skipped,
}

pub struct StatusReconciler<'a, A, C, S, L>
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

impl<'a, A, C, S, L> StatusReconciler<'a, A, C, S, L>
where
    A: AssociationRepository + ?Sized,
    C: ArtifactCatalog + ?Sized,
    S: SiteRepository + ?Sized,
    L: ActivityLog + ?Sized,
{
    /// Folds a transition into the association. Callers serialize per association; the
    /// compare-and-swap guards against writers in other processes.
    pub async fn fold(
        &self,
        site: &Site,
        association_id: Uuid,
        revision: Option<i64>,
        transition: &Transition,
        actor: &str,
    ) -> Result<FoldResult, ReconcileError> {
        let current = self
            .associations
            .get(association_id)
            .await
            .map_err(ReconcileError::Load)?
            .ok_or(ReconcileError::NotFound)?;
        if current.site_id != site.id {
            return Err(ReconcileError::ForeignAssociation);
        }
        if let Some(rev) = revision {
            if rev < current.revision {
                tracing::info!(
                    association_id = %association_id,
                    reported = rev,
                    stored = current.revision,
                    transition = transition.label(),
                    "stale_fold_discarded"
                );
                return Ok(FoldResult::Stale {
                    stored_revision: current.revision,
                });
            }
        }

        let next = current.apply(transition, Utc::now());
        let saved = self
            .associations
            .save(&next, current.revision)
            .await
            .map_err(ReconcileError::Persist)?;
        if !saved {
            tracing::info!(
                association_id = %association_id,
                transition = transition.label(),
                "fold_lost_revision_race"
            );
            return Ok(FoldResult::Stale {
                stored_revision: current.revision,
            });
        }

        let entry = ActivityEntry::by(actor, site.id, Some(next.id), transition.label());
        let entry = match transition {
            Transition::Failed { message }
            | Transition::UpdateInstallFailed { message }
            | Transition::ActivationFailed { message, .. } => entry.with_details(message.clone()),
            _ => entry.with_details(format!(
                "status={} version={}",
                next.status,
                next.installed_version.as_deref().unwrap_or("-")
            )),
        };
        self.audit(&entry).await;
        Ok(FoldResult::Applied(next))
    }

    /// Pull path: the report is validated before anything is read or written.
    pub async fn fold_report(
        &self,
        site: &Site,
        report: &StatusReport,
    ) -> Result<FoldResult, ReconcileError> {
        let transition = report.transition()?;
        self.fold(site, report.association_id, report.revision, &transition, "agent")
            .await
    }

    /// Makes the store agree with an authoritative inventory of one kind on `site`.
    ///
    /// Each row is re-read under its association lock, so a listing never interleaves with a
    /// command that is executing or folding for the same pair. Callers must not already hold
    /// a lock for this site.
    pub async fn reconcile_listing(
        &self,
        site: &Site,
        listing: &RemoteListing,
    ) -> Result<ListingSummary, ReconcileError> {
        let now = Utc::now();
        let mut summary = ListingSummary {
            kind: Some(listing.kind),
            ..ListingSummary::default()
        };
        let mut seen: HashSet<Uuid> = HashSet::new();

        for remote in &listing.artifacts {
            let artifact = match self
                .catalog
                .find_by_slug(listing.kind, &remote.slug)
                .await
                .map_err(ReconcileError::Load)?
            {
                Some(a) => a,
                None => self
                    .catalog
                    .register_external(
                        listing.kind,
                        &remote.slug,
                        remote.name.as_deref().unwrap_or(&remote.slug),
                    )
                    .await
                    .map_err(ReconcileError::Persist)?,
            };
            seen.insert(artifact.id);

            let _guard = self.locks.lock(site.id, artifact.id).await;
            let existing = self
                .associations
                .find(site.id, artifact.id)
                .await
                .map_err(ReconcileError::Load)?;
            match existing {
                None => {
                    let created = Association::discovered(
                        site.id,
                        artifact.id,
                        remote.version.clone(),
                        remote.is_active,
                        now,
                    );
                    self.associations
                        .insert(&created)
                        .await
                        .map_err(ReconcileError::Persist)?;
                    summary.discovered += 1;
                    self.audit(
                        &ActivityEntry::system(site.id, Some(created.id), "discovered")
                            .with_details(format!("{} {}", remote.slug, remote.version)),
                    )
                    .await;
                }
                Some(current) if current.is_retired() => {
                    let next = current.revived(remote.version.clone(), remote.is_active, now);
                    if self.store(&current, &next).await? {
                        summary.revived += 1;
                        self.audit(
                            &ActivityEntry::system(site.id, Some(next.id), "revived")
                                .with_details(format!("{} {}", remote.slug, remote.version)),
                        )
                        .await;
                    } else {
                        summary.skipped += 1;
                    }
                }
                Some(current) => {
                    let observed = Transition::Observed {
                        version: Some(remote.version.clone()),
                        active: remote.is_active,
                    };
                    match self.observe(site, &current, &observed, now).await? {
                        Observation::Unchanged => summary.unchanged += 1,
                        Observation::Changed => summary.updated += 1,
                        Observation::Skipped => summary.skipped += 1,
                    }
                }
            }
        }

        let tracked = self
            .associations
            .list_for_site(site.id)
            .await
            .map_err(ReconcileError::Load)?;
        for stale in tracked.into_iter().filter(|a| !seen.contains(&a.artifact_id)) {
            let artifact = self
                .catalog
                .get(stale.artifact_id)
                .await
                .map_err(ReconcileError::Load)?;
            if artifact.is_none_or(|a| a.kind != listing.kind) {
                continue;
            }
            let _guard = self.locks.lock(site.id, stale.artifact_id).await;
            let Some(current) = self
                .associations
                .get(stale.id)
                .await
                .map_err(ReconcileError::Load)?
            else {
                continue;
            };
            let absent = Transition::Observed {
                version: None,
                active: false,
            };
            match self.observe(site, &current, &absent, now).await? {
                Observation::Unchanged => summary.unchanged += 1,
                Observation::Changed => summary.removed += 1,
                Observation::Skipped => summary.skipped += 1,
            }
        }

        tracing::debug!(
            site_id = %site.id,
            kind = listing.kind.as_str(),
            discovered = summary.discovered,
            revived = summary.revived,
            updated = summary.updated,
            removed = summary.removed,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            "listing_reconciled"
        );
        Ok(summary)
    }

    /// Records whether the site answered, plus the WordPress version when it reported one.
    pub async fn record_connectivity(&self, site: &Site, reached: bool, wp_version: Option<&str>) {
        let status = if reached {
            ConnectionStatus::Active
        } else {
            ConnectionStatus::Error
        };
        if let Err(err) = self
            .sites
            .record_connection(site.id, status, wp_version, Utc::now())
            .await
        {
            tracing::warn!(site_id = %site.id, error = ?err, "site_connectivity_write_failed");
        }
    }

    async fn observe(
        &self,
        site: &Site,
        current: &Association,
        observed: &Transition,
        now: DateTime<Utc>,
    ) -> Result<Observation, ReconcileError> {
        let next = current.apply(observed, now);
        if next.same_state(current) {
            self.associations
                .touch(current.id, now)
                .await
                .map_err(ReconcileError::Persist)?;
            return Ok(Observation::Unchanged);
        }
        if !self.store(current, &next).await? {
            return Ok(Observation::Skipped);
        }
        self.audit(
            &ActivityEntry::system(site.id, Some(next.id), "observed").with_details(format!(
                "status={} version={}",
                next.status,
                next.installed_version.as_deref().unwrap_or("-")
            )),
        )
        .await;
        Ok(Observation::Changed)
    }

    async fn store(&self, current: &Association, next: &Association) -> Result<bool, ReconcileError> {
        let saved = self
            .associations
            .save(next, current.revision)
            .await
            .map_err(ReconcileError::Persist)?;
        if !saved {
            tracing::info!(association_id = %current.id, "listing_update_lost_revision_race");
        }
        Ok(saved)
    }

    async fn audit(&self, entry: &ActivityEntry) {
        if let Err(err) = self.activity.record(entry).await {
            tracing::warn!(
                site_id = %entry.site_id,
                action = %entry.action,
                error = ?err,
                "activity_log_write_failed"
            );
        }
    }
}
