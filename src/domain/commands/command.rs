use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::artifacts::artifact::ArtifactKind;

/// Action names as they appear on the wire and in user requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Install,
    Update,
    Activate,
    Deactivate,
    Uninstall,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Install => "install",
            ActionKind::Update => "update",
            ActionKind::Activate => "activate",
            ActionKind::Deactivate => "deactivate",
            ActionKind::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "install" => ActionKind::Install,
            "update" => ActionKind::Update,
            "activate" => ActionKind::Activate,
            "deactivate" => ActionKind::Deactivate,
            "uninstall" => ActionKind::Uninstall,
            other => anyhow::bail!("unknown action: {other}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    Install { version: String, download_url: String },
    Update { version: String, download_url: String },
    Activate,
    Deactivate,
    Uninstall,
}

impl CommandAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            CommandAction::Install { .. } => ActionKind::Install,
            CommandAction::Update { .. } => ActionKind::Update,
            CommandAction::Activate => ActionKind::Activate,
            CommandAction::Deactivate => ActionKind::Deactivate,
            CommandAction::Uninstall => ActionKind::Uninstall,
        }
    }

    pub fn target_version(&self) -> Option<&str> {
        match self {
            CommandAction::Install { version, .. } | CommandAction::Update { version, .. } => {
                Some(version)
            }
            _ => None,
        }
    }

    pub fn download_url(&self) -> Option<&str> {
        match self {
            CommandAction::Install { download_url, .. }
            | CommandAction::Update { download_url, .. } => Some(download_url),
            _ => None,
        }
    }
}

/// Outstanding work for one association. Computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub association_id: Uuid,
    pub site_id: Uuid,
    pub artifact_id: Uuid,
    pub kind: ArtifactKind,
    pub slug: String,
    /// Association revision the command was computed from.
    pub revision: i64,
    pub action: CommandAction,
}
