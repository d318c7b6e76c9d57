use async_trait::async_trait;

use crate::domain::artifacts::artifact::ArtifactKind;
use crate::domain::artifacts::listing::RemoteListing;
use crate::domain::sites::site::Site;

/// A single call against a site's connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorRequest {
    Install {
        kind: ArtifactKind,
        slug: String,
        file_url: String,
    },
    Activate {
        kind: ArtifactKind,
        slug: String,
    },
    Deactivate {
        kind: ArtifactKind,
        slug: String,
    },
    Uninstall {
        kind: ArtifactKind,
        slug: String,
    },
}

impl ConnectorRequest {
    pub fn slug(&self) -> &str {
        match self {
            ConnectorRequest::Install { slug, .. }
            | ConnectorRequest::Activate { slug, .. }
            | ConnectorRequest::Deactivate { slug, .. }
            | ConnectorRequest::Uninstall { slug, .. } => slug,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectorRequest::Install { .. } => "install",
            ConnectorRequest::Activate { .. } => "activate",
            ConnectorRequest::Deactivate { .. } => "deactivate",
            ConnectorRequest::Uninstall { .. } => "uninstall",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorReply {
    pub version: Option<String>,
    pub new_status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingReply {
    pub message: Option<String>,
    pub wp_version: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("connector call timed out")]
    Timeout,
    #[error("connector unreachable: {0}")]
    Unreachable(String),
    #[error("connector rejected the call ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("connector returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("{0} is not supported by the connector")]
    Unsupported(String),
}

impl ConnectorError {
    /// Whether the failure says something about reachability rather than the action itself.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ConnectorError::Timeout | ConnectorError::Unreachable(_))
    }
}

#[async_trait]
pub trait ConnectorClient: Send + Sync {
    async fn invoke(
        &self,
        site: &Site,
        request: &ConnectorRequest,
    ) -> Result<ConnectorReply, ConnectorError>;

    async fn list_installed(
        &self,
        site: &Site,
        kind: ArtifactKind,
    ) -> Result<RemoteListing, ConnectorError>;

    async fn ping(&self, site: &Site) -> Result<PingReply, ConnectorError>;
}
