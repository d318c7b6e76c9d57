use crate::domain::artifacts::artifact::{Artifact, ArtifactRelease, same_version};
use crate::domain::artifacts::listing::RemoteListing;
use crate::domain::associations::association::{ArtifactStatus, Association};
use crate::domain::commands::command::{Command, CommandAction};

/// An association joined with the catalog data the diff needs.
#[derive(Debug, Clone)]
pub struct TrackedArtifact {
    pub association: Association,
    pub artifact: Artifact,
    /// Release matching `requested_version`, or the latest one when nothing is requested.
    pub release: Option<ArtifactRelease>,
}

/// Outstanding commands for a set of associations, at most one per association.
///
/// Pure: the same input always yields the same commands, so both the agent pull path and
/// inspection endpoints can call it freely. A listing, when given, overrides the installed
/// version recorded in the store.
pub fn compute_commands(
    items: &[TrackedArtifact],
    last_known_listing: Option<&RemoteListing>,
) -> Vec<Command> {
    items
        .iter()
        .filter_map(|item| command_for(item, last_known_listing))
        .collect()
}

pub fn command_for(item: &TrackedArtifact, listing: Option<&RemoteListing>) -> Option<Command> {
    let assoc = &item.association;
    if assoc.is_retired() {
        return None;
    }

    let installed: Option<&str> = match listing.filter(|l| l.kind == item.artifact.kind) {
        Some(l) => l.find(&item.artifact.slug).map(|r| r.version.as_str()),
        None => assoc.installed_version.as_deref(),
    };
    let pending = assoc.status == ArtifactStatus::Pending;

    let action = if !assoc.is_enabled && installed.is_some() {
        CommandAction::Uninstall
    } else if pending && installed.is_none() {
        let release = release_or_skip(item)?;
        CommandAction::Install {
            version: release.version.clone(),
            download_url: release.file_url.clone(),
        }
    } else if pending
        && assoc
            .requested_version
            .as_deref()
            .is_some_and(|requested| !installed.is_some_and(|v| same_version(requested, v)))
    {
        let release = release_or_skip(item)?;
        CommandAction::Update {
            version: release.version.clone(),
            download_url: release.file_url.clone(),
        }
    } else if pending && assoc.is_active {
        CommandAction::Activate
    } else if pending {
        CommandAction::Deactivate
    } else {
        return None;
    };

    Some(Command {
        association_id: assoc.id,
        site_id: assoc.site_id,
        artifact_id: assoc.artifact_id,
        kind: item.artifact.kind,
        slug: item.artifact.slug.clone(),
        revision: assoc.revision,
        action,
    })
}

fn release_or_skip(item: &TrackedArtifact) -> Option<&ArtifactRelease> {
    if item.release.is_none() {
        tracing::warn!(
            association_id = %item.association.id,
            slug = %item.artifact.slug,
            requested = ?item.association.requested_version,
            "diff_skipped_missing_release"
        );
    }
    item.release.as_ref()
}
