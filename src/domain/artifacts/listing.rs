use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::artifacts::artifact::ArtifactKind;

/// One entry of a site's full inventory as reported by the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RemoteArtifact {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    pub version: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteListing {
    pub kind: ArtifactKind,
    pub artifacts: Vec<RemoteArtifact>,
}

impl RemoteListing {
    pub fn new(kind: ArtifactKind, artifacts: Vec<RemoteArtifact>) -> Self {
        Self { kind, artifacts }
    }

    pub fn find(&self, slug: &str) -> Option<&RemoteArtifact> {
        self.artifacts.iter().find(|a| a.slug == slug)
    }
}
