use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::artifacts::artifact::same_version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Pending,
    Installed,
    Active,
    Inactive,
    Available,
    Unavailable,
    Error,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "pending",
            ArtifactStatus::Installed => "installed",
            ArtifactStatus::Active => "active",
            ArtifactStatus::Inactive => "inactive",
            ArtifactStatus::Available => "available",
            ArtifactStatus::Unavailable => "unavailable",
            ArtifactStatus::Error => "error",
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => ArtifactStatus::Pending,
            "installed" => ArtifactStatus::Installed,
            "active" => ArtifactStatus::Active,
            "inactive" => ArtifactStatus::Inactive,
            "available" => ArtifactStatus::Available,
            "unavailable" => ArtifactStatus::Unavailable,
            "error" => ArtifactStatus::Error,
            other => anyhow::bail!("unknown artifact status: {other}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssociationOrigin {
    /// Created by a user enabling the artifact for the site.
    Platform,
    /// Found on the site by a full listing; installed by an operator.
    Discovered,
}

impl AssociationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationOrigin::Platform => "platform",
            AssociationOrigin::Discovered => "discovered",
        }
    }
}

impl FromStr for AssociationOrigin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" => Ok(AssociationOrigin::Platform),
            "discovered" => Ok(AssociationOrigin::Discovered),
            other => anyhow::bail!("unknown association origin: {other}"),
        }
    }
}

/// Desired and last-confirmed state of one artifact on one site.
///
/// While `status` is [`ArtifactStatus::Pending`], `is_active` holds the requested activation
/// target instead of the confirmed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub id: Uuid,
    pub site_id: Uuid,
    pub artifact_id: Uuid,
    pub is_enabled: bool,
    pub requested_version: Option<String>,
    pub installed_version: Option<String>,
    pub is_active: bool,
    pub status: ArtifactStatus,
    pub origin: AssociationOrigin,
    pub revision: i64,
    pub last_error: Option<String>,
    pub last_sync: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

/// Outcome of a remote action or observation, folded into an [`Association`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Installed { version: Option<String> },
    Activated { version: Option<String> },
    /// An update installed the new copy but could not activate it.
    ActivationFailed { version: Option<String>, message: String },
    Deactivated,
    Uninstalled,
    Failed { message: String },
    /// The install step of an update failed after the old copy was removed.
    UpdateInstallFailed { message: String },
    /// Full listing: `version` is `None` when the artifact is absent from the site.
    Observed { version: Option<String>, active: bool },
}

impl Transition {
    pub fn label(&self) -> &'static str {
        match self {
            Transition::Installed { .. } => "installed",
            Transition::Activated { .. } => "activated",
            Transition::ActivationFailed { .. } => "activation_failed",
            Transition::Deactivated => "deactivated",
            Transition::Uninstalled => "uninstalled",
            Transition::Failed { .. } => "failed",
            Transition::UpdateInstallFailed { .. } => "update_install_failed",
            Transition::Observed { .. } => "observed",
        }
    }
}

impl Association {
    pub fn enabled(
        site_id: Uuid,
        artifact_id: Uuid,
        requested_version: Option<String>,
        activate: bool,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            artifact_id,
            is_enabled: true,
            requested_version,
            installed_version: None,
            is_active: activate,
            status: ArtifactStatus::Pending,
            origin: AssociationOrigin::Platform,
            revision: 0,
            last_error: None,
            last_sync: at,
            retired_at: None,
        }
    }

    /// Association for an artifact found on the site that the platform never asked for.
    pub fn discovered(
        site_id: Uuid,
        artifact_id: Uuid,
        version: String,
        active: bool,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            artifact_id,
            is_enabled: true,
            requested_version: None,
            installed_version: Some(version),
            is_active: active,
            status: if active {
                ArtifactStatus::Active
            } else {
                ArtifactStatus::Inactive
            },
            origin: AssociationOrigin::Discovered,
            revision: 0,
            last_error: None,
            last_sync: at,
            retired_at: None,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }

    pub fn is_installed(&self) -> bool {
        self.installed_version.is_some()
    }

    /// Re-enables the association (reviving a retired one) and marks it pending.
    pub fn reenabled(
        &self,
        requested_version: Option<String>,
        activate: bool,
        at: DateTime<Utc>,
    ) -> Self {
        let mut next = self.bumped(at);
        next.is_enabled = true;
        next.retired_at = None;
        next.requested_version = requested_version;
        next.is_active = activate;
        next.status = ArtifactStatus::Pending;
        next.last_error = None;
        if self.is_retired() {
            next.origin = AssociationOrigin::Platform;
        }
        next
    }

    /// A retired association whose artifact showed up on the site again.
    pub fn revived(&self, version: String, active: bool, at: DateTime<Utc>) -> Self {
        let mut next = self.bumped(at);
        next.is_enabled = true;
        next.retired_at = None;
        next.origin = AssociationOrigin::Discovered;
        next.requested_version = None;
        next.installed_version = Some(version);
        next.is_active = active;
        next.status = if active {
            ArtifactStatus::Active
        } else {
            ArtifactStatus::Inactive
        };
        next.last_error = None;
        next
    }

    /// Records a user request for a version and/or activation target.
    pub fn requested(
        &self,
        requested_version: Option<Option<String>>,
        activate: Option<bool>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut next = self.bumped(at);
        if let Some(version) = requested_version {
            next.requested_version = version;
        }
        if let Some(active) = activate {
            next.is_active = active;
        }
        next.status = ArtifactStatus::Pending;
        next
    }

    /// The platform no longer wants the artifact. Nothing installed means removal is already
    /// confirmed, so the association is retired on the spot.
    pub fn disabled(&self, at: DateTime<Utc>) -> Self {
        let mut next = self.bumped(at);
        next.is_enabled = false;
        if next.installed_version.is_none() {
            next.status = ArtifactStatus::Unavailable;
            next.is_active = false;
            next.retired_at = Some(at);
        } else if next.status == ArtifactStatus::Available {
            next.status = ArtifactStatus::Unavailable;
        }
        next
    }

    /// Folds a transition into a new association value with an advanced revision.
    pub fn apply(&self, transition: &Transition, at: DateTime<Utc>) -> Self {
        let mut next = self.bumped(at);
        match transition {
            Transition::Installed { version } => {
                next.installed_version = version.clone().or(next.installed_version);
                next.last_error = None;
                let mismatch = match (&next.requested_version, &next.installed_version) {
                    (Some(requested), Some(installed)) if !same_version(requested, installed) => {
                        Some(format!("installed {installed}, requested {requested}"))
                    }
                    _ => None,
                };
                let activation_pending = self.status == ArtifactStatus::Pending && self.is_active;
                // A pending activation stays outstanding so the next diff emits it.
                if !activation_pending || mismatch.is_some() {
                    next.status = ArtifactStatus::Installed;
                    next.is_active = false;
                }
                if activation_pending {
                    if let Some(mismatch) = mismatch {
                        next.last_error = Some(format!("activation dropped: {mismatch}"));
                    }
                }
            }
            Transition::Activated { version } => {
                next.installed_version = version.clone().or(next.installed_version);
                next.status = ArtifactStatus::Active;
                next.is_active = true;
                next.last_error = None;
            }
            Transition::ActivationFailed { version, message } => {
                next.installed_version = version.clone().or(next.installed_version);
                next.status = ArtifactStatus::Installed;
                next.is_active = false;
                next.last_error = Some(message.clone());
            }
            Transition::Deactivated => {
                next.status = ArtifactStatus::Inactive;
                next.is_active = false;
                next.last_error = None;
            }
            Transition::Uninstalled => {
                next.installed_version = None;
                next.is_active = false;
                next.status = next.absent_status();
                next.last_error = None;
            }
            Transition::Failed { message } => {
                next.status = ArtifactStatus::Error;
                next.last_error = Some(message.clone());
            }
            Transition::UpdateInstallFailed { message } => {
                next.installed_version = None;
                next.is_active = false;
                next.status = ArtifactStatus::Error;
                next.last_error = Some(message.clone());
            }
            Transition::Observed {
                version: Some(version),
                active,
            } => {
                next.installed_version = Some(version.clone());
                // A pending row keeps its requested activation target.
                if next.status != ArtifactStatus::Pending {
                    next.is_active = *active;
                    next.status = if *active {
                        ArtifactStatus::Active
                    } else {
                        ArtifactStatus::Inactive
                    };
                    next.last_error = None;
                }
            }
            Transition::Observed { version: None, .. } => {
                next.installed_version = None;
                if next.status != ArtifactStatus::Pending {
                    next.is_active = false;
                    next.status = next.absent_status();
                    next.last_error = None;
                }
            }
        }
        if next.status == ArtifactStatus::Unavailable && next.retired_at.is_none() {
            next.retired_at = Some(at);
        }
        next
    }

    /// Compares everything except bookkeeping (`revision`, `last_sync`).
    pub fn same_state(&self, other: &Association) -> bool {
        self.is_enabled == other.is_enabled
            && self.requested_version == other.requested_version
            && self.installed_version == other.installed_version
            && self.is_active == other.is_active
            && self.status == other.status
            && self.origin == other.origin
            && self.last_error == other.last_error
            && self.retired_at == other.retired_at
    }

    fn absent_status(&self) -> ArtifactStatus {
        if self.is_enabled {
            ArtifactStatus::Available
        } else {
            ArtifactStatus::Unavailable
        }
    }

    fn bumped(&self, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.revision = self.revision + 1;
        next.last_sync = at;
        next
    }
}
