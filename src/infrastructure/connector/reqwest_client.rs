use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::application::ports::connector_client::{
    ConnectorClient, ConnectorError, ConnectorReply, ConnectorRequest, PingReply,
};
use crate::domain::artifacts::artifact::ArtifactKind;
use crate::domain::artifacts::listing::{RemoteArtifact, RemoteListing};
use crate::domain::sites::site::Site;

/// HTTP client for the connector plugin running inside each WordPress site.
pub struct ReqwestConnectorClient {
    client: reqwest::Client,
    path_prefix: String,
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    code: Option<String>,
    version: Option<String>,
    new_status: Option<String>,
    wp_version: Option<String>,
    plugins: Option<Vec<ListedArtifact>>,
    themes: Option<Vec<ListedArtifact>>,
}

impl Envelope {
    fn failure_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "unknown connector error".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ListedArtifact {
    slug: String,
    name: Option<String>,
    #[serde(default)]
    version: String,
    #[serde(default)]
    status: String,
}

impl ReqwestConnectorClient {
    pub fn new(timeout: Duration, path_prefix: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wphub/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let trimmed = path_prefix.trim_matches('/');
        let path_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Ok(Self {
            client,
            path_prefix,
        })
    }

    fn endpoint_url(&self, site: &Site, endpoint: &str) -> String {
        format!(
            "{}{}/{}",
            site.base_url.trim_end_matches('/'),
            self.path_prefix,
            endpoint
        )
    }

    async fn call(
        &self,
        site: &Site,
        endpoint: &str,
        mut body: Map<String, Value>,
    ) -> Result<Envelope, ConnectorError> {
        body.insert("api_key".into(), Value::String(site.api_key.clone()));
        let url = self.endpoint_url(site, endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope>(&text)
                .map(|e| e.failure_message())
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            tracing::debug!(site_id = %site.id, endpoint, status = status.as_u16(), "connector_call_rejected");
            return Err(ConnectorError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        let envelope: Envelope = serde_json::from_str(&text)
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
        if !envelope.success {
            return Err(ConnectorError::Rejected {
                status: status.as_u16(),
                message: envelope.failure_message(),
            });
        }
        Ok(envelope)
    }
}

fn transport_error(err: reqwest::Error) -> ConnectorError {
    if err.is_timeout() {
        ConnectorError::Timeout
    } else if err.is_decode() {
        ConnectorError::InvalidResponse(err.to_string())
    } else {
        ConnectorError::Unreachable(err.to_string())
    }
}

fn slug_key(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Plugin => "plugin_slug",
        ArtifactKind::Theme => "theme_slug",
    }
}

fn endpoint_for(request: &ConnectorRequest) -> Result<&'static str, ConnectorError> {
    Ok(match request {
        ConnectorRequest::Install {
            kind: ArtifactKind::Plugin,
            ..
        } => "installPlugin",
        ConnectorRequest::Install {
            kind: ArtifactKind::Theme,
            ..
        } => "installTheme",
        ConnectorRequest::Activate {
            kind: ArtifactKind::Plugin,
            ..
        } => "activatePlugin",
        ConnectorRequest::Activate {
            kind: ArtifactKind::Theme,
            ..
        } => "activateTheme",
        ConnectorRequest::Deactivate {
            kind: ArtifactKind::Plugin,
            ..
        } => "deactivatePlugin",
        ConnectorRequest::Deactivate {
            kind: ArtifactKind::Theme,
            ..
        } => return Err(ConnectorError::Unsupported("theme deactivation".into())),
        ConnectorRequest::Uninstall {
            kind: ArtifactKind::Plugin,
            ..
        } => "uninstallPlugin",
        ConnectorRequest::Uninstall {
            kind: ArtifactKind::Theme,
            ..
        } => "uninstallTheme",
    })
}

fn request_kind(request: &ConnectorRequest) -> ArtifactKind {
    match request {
        ConnectorRequest::Install { kind, .. }
        | ConnectorRequest::Activate { kind, .. }
        | ConnectorRequest::Deactivate { kind, .. }
        | ConnectorRequest::Uninstall { kind, .. } => *kind,
    }
}

#[async_trait]
impl ConnectorClient for ReqwestConnectorClient {
    async fn invoke(
        &self,
        site: &Site,
        request: &ConnectorRequest,
    ) -> Result<ConnectorReply, ConnectorError> {
        let endpoint = endpoint_for(request)?;
        tracing::debug!(
            site_id = %site.id,
            action = request.label(),
            slug = request.slug(),
            "connector_invoke"
        );
        let mut body = Map::new();
        body.insert(
            slug_key(request_kind(request)).into(),
            Value::String(request.slug().to_string()),
        );
        if let ConnectorRequest::Install { file_url, .. } = request {
            body.insert("file_url".into(), Value::String(file_url.clone()));
        }
        let envelope = self.call(site, endpoint, body).await?;
        Ok(ConnectorReply {
            version: envelope.version,
            new_status: envelope.new_status,
            message: envelope.message,
        })
    }

    async fn list_installed(
        &self,
        site: &Site,
        kind: ArtifactKind,
    ) -> Result<RemoteListing, ConnectorError> {
        let endpoint = match kind {
            ArtifactKind::Plugin => "listPlugins",
            ArtifactKind::Theme => "listThemes",
        };
        let envelope = self.call(site, endpoint, Map::new()).await?;
        let items = match kind {
            ArtifactKind::Plugin => envelope.plugins,
            ArtifactKind::Theme => envelope.themes,
        }
        .ok_or_else(|| ConnectorError::InvalidResponse(format!("{endpoint} returned no list")))?;
        let artifacts = items
            .into_iter()
            .map(|item| RemoteArtifact {
                is_active: item.status == "active",
                slug: item.slug,
                name: item.name,
                version: item.version,
            })
            .collect();
        Ok(RemoteListing::new(kind, artifacts))
    }

    async fn ping(&self, site: &Site) -> Result<PingReply, ConnectorError> {
        let envelope = self.call(site, "ping", Map::new()).await?;
        Ok(PingReply {
            message: envelope.message,
            wp_version: envelope.wp_version,
        })
    }
}
