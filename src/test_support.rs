use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use crate::application::ports::activity_log::{ActivityEntry, ActivityLog};
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::connector_client::{
    ConnectorClient, ConnectorError, ConnectorReply, ConnectorRequest, PingReply,
};
use crate::application::ports::site_repository::SiteRepository;
use crate::domain::artifacts::artifact::{
    Artifact, ArtifactKind, ArtifactRelease, latest_release,
};
use crate::domain::artifacts::listing::{RemoteArtifact, RemoteListing};
use crate::domain::associations::association::Association;
use crate::bootstrap::app_context::{AppContext, AppServices};
use crate::bootstrap::config::Config;
use crate::domain::sites::site::{ConnectionStatus, Site};
use crate::infrastructure::audit::broadcast_activity_log::BroadcastActivityLog;

pub fn site(api_key: &str) -> Site {
    let id = Uuid::new_v4();
    Site {
        id,
        name: format!("site-{}", &id.to_string()[..8]),
        base_url: "https://wp.example.test".to_string(),
        api_key: api_key.to_string(),
        connection_status: ConnectionStatus::Unknown,
        last_connection: None,
        wp_version: None,
    }
}

pub fn remote(slug: &str, version: &str, active: bool) -> RemoteArtifact {
    RemoteArtifact {
        slug: slug.to_string(),
        name: None,
        version: version.to_string(),
        is_active: active,
    }
}

#[derive(Default)]
pub struct MemorySites {
    sites: Mutex<Vec<Site>>,
}

impl MemorySites {
    pub fn new(sites: Vec<Site>) -> Self {
        Self {
            sites: Mutex::new(sites),
        }
    }

    pub fn snapshot(&self, id: Uuid) -> Option<Site> {
        self.sites.lock().unwrap().iter().find(|s| s.id == id).cloned()
    }
}

#[async_trait]
impl SiteRepository for MemorySites {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Site>> {
        Ok(self.snapshot(id))
    }

    async fn find_by_api_key(&self, api_key: &str) -> anyhow::Result<Vec<Site>> {
        Ok(self
            .sites
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.api_key == api_key)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Site>> {
        Ok(self.sites.lock().unwrap().clone())
    }

    async fn record_connection(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        wp_version: Option<&str>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut sites = self.sites.lock().unwrap();
        if let Some(site) = sites.iter_mut().find(|s| s.id == id) {
            site.connection_status = status;
            site.last_connection = Some(at);
            if let Some(v) = wp_version {
                site.wp_version = Some(v.to_string());
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAssociations {
    rows: Mutex<HashMap<Uuid, Association>>,
    writes: AtomicUsize,
}

impl MemoryAssociations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, association: Association) -> Association {
        self.rows
            .lock()
            .unwrap()
            .insert(association.id, association.clone());
        association
    }

    pub fn snapshot(&self, id: Uuid) -> Option<Association> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Association> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    /// State-changing writes (`insert` and successful `save`).
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssociationRepository for MemoryAssociations {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Association>> {
        Ok(self.snapshot(id))
    }

    async fn find(&self, site_id: Uuid, artifact_id: Uuid) -> anyhow::Result<Option<Association>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|a| a.site_id == site_id && a.artifact_id == artifact_id)
            .cloned())
    }

    async fn list_for_site(&self, site_id: Uuid) -> anyhow::Result<Vec<Association>> {
        let mut rows: Vec<Association> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.site_id == site_id && !a.is_retired())
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.id);
        Ok(rows)
    }

    async fn insert(&self, association: &Association) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .values()
            .any(|a| a.site_id == association.site_id && a.artifact_id == association.artifact_id)
        {
            anyhow::bail!("association already exists");
        }
        rows.insert(association.id, association.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save(
        &self,
        association: &Association,
        expected_revision: i64,
    ) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&association.id) {
            Some(stored) if stored.revision == expected_revision => {
                rows.insert(association.id, association.clone());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.last_sync = at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    artifacts: Mutex<Vec<Artifact>>,
    releases: Mutex<Vec<ArtifactRelease>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: ArtifactKind, slug: &str, versions: &[&str]) -> Artifact {
        let artifact = Artifact {
            id: Uuid::new_v4(),
            kind,
            slug: slug.to_string(),
            name: slug.to_string(),
            is_external: false,
        };
        self.artifacts.lock().unwrap().push(artifact.clone());
        let mut releases = self.releases.lock().unwrap();
        for v in versions {
            releases.push(ArtifactRelease {
                artifact_id: artifact.id,
                version: v.to_string(),
                file_url: format!("https://files.example.test/{slug}-{v}.zip"),
            });
        }
        artifact
    }

    pub fn all(&self) -> Vec<Artifact> {
        self.artifacts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactCatalog for MemoryCatalog {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Artifact>> {
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn find_by_slug(
        &self,
        kind: ArtifactKind,
        slug: &str,
    ) -> anyhow::Result<Option<Artifact>> {
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.kind == kind && a.slug == slug)
            .cloned())
    }

    async fn release(
        &self,
        artifact_id: Uuid,
        version: Option<&str>,
    ) -> anyhow::Result<Option<ArtifactRelease>> {
        let releases: Vec<ArtifactRelease> = self
            .releases
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.artifact_id == artifact_id)
            .cloned()
            .collect();
        Ok(match version {
            Some(v) => releases.into_iter().find(|r| r.version == v),
            None => latest_release(&releases).cloned(),
        })
    }

    async fn register_external(
        &self,
        kind: ArtifactKind,
        slug: &str,
        name: &str,
    ) -> anyhow::Result<Artifact> {
        let mut artifacts = self.artifacts.lock().unwrap();
        if let Some(existing) = artifacts.iter().find(|a| a.kind == kind && a.slug == slug) {
            return Ok(existing.clone());
        }
        let artifact = Artifact {
            id: Uuid::new_v4(),
            kind,
            slug: slug.to_string(),
            name: name.to_string(),
            is_external: true,
        };
        artifacts.push(artifact.clone());
        Ok(artifact)
    }
}

#[derive(Default)]
pub struct MemoryActivityLog {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn record(&self, entry: &ActivityEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Connector double: succeeds unless a failure is scripted for an action label.
#[derive(Default)]
pub struct ScriptedConnector {
    calls: Mutex<Vec<ConnectorRequest>>,
    failures: Mutex<HashMap<&'static str, ConnectorError>>,
    install_versions: Mutex<HashMap<String, String>>,
    listings: Mutex<HashMap<(Uuid, ArtifactKind), Result<RemoteListing, ConnectorError>>>,
    ping: Mutex<Option<Result<PingReply, ConnectorError>>>,
    delay: Option<Duration>,
    invoke_delay: Mutex<Option<Duration>>,
    install_started: Notify,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    listing_calls: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every `invoke` sleeps this long before answering.
    pub fn hold_invocations(&self, delay: Duration) {
        *self.invoke_delay.lock().unwrap() = Some(delay);
    }

    /// Resolves once an install call has reached the connector.
    pub async fn install_started(&self) {
        self.install_started.notified().await;
    }

    pub fn fail(&self, label: &'static str, err: ConnectorError) {
        self.failures.lock().unwrap().insert(label, err);
    }

    pub fn installs_version(&self, slug: &str, version: &str) {
        self.install_versions
            .lock()
            .unwrap()
            .insert(slug.to_string(), version.to_string());
    }

    pub fn listing(&self, site_id: Uuid, kind: ArtifactKind, artifacts: Vec<RemoteArtifact>) {
        self.listings
            .lock()
            .unwrap()
            .insert((site_id, kind), Ok(RemoteListing::new(kind, artifacts)));
    }

    pub fn fail_listing(&self, site_id: Uuid, kind: ArtifactKind, err: ConnectorError) {
        self.listings
            .lock()
            .unwrap()
            .insert((site_id, kind), Err(err));
    }

    pub fn set_ping(&self, reply: Result<PingReply, ConnectorError>) {
        *self.ping.lock().unwrap() = Some(reply);
    }

    pub fn calls(&self) -> Vec<ConnectorRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.label()).collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectorClient for ScriptedConnector {
    async fn invoke(
        &self,
        _site: &Site,
        request: &ConnectorRequest,
    ) -> Result<ConnectorReply, ConnectorError> {
        self.calls.lock().unwrap().push(request.clone());
        if matches!(request, ConnectorRequest::Install { .. }) {
            self.install_started.notify_one();
        }
        let hold = *self.invoke_delay.lock().unwrap();
        if let Some(delay) = hold {
            tokio::time::sleep(delay).await;
        }
        if let ConnectorRequest::Deactivate {
            kind: ArtifactKind::Theme,
            ..
        } = request
        {
            return Err(ConnectorError::Unsupported("theme deactivation".into()));
        }
        if let Some(err) = self.failures.lock().unwrap().get(request.label()) {
            return Err(err.clone());
        }
        let version = match request {
            ConnectorRequest::Install { slug, .. } => {
                self.install_versions.lock().unwrap().get(slug).cloned()
            }
            _ => None,
        };
        Ok(ConnectorReply {
            version,
            new_status: None,
            message: Some(format!("{} ok", request.label())),
        })
    }

    async fn list_installed(
        &self,
        site: &Site,
        kind: ArtifactKind,
    ) -> Result<RemoteListing, ConnectorError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.listings
            .lock()
            .unwrap()
            .get(&(site.id, kind))
            .cloned()
            .unwrap_or_else(|| Ok(RemoteListing::new(kind, vec![])))
    }

    async fn ping(&self, _site: &Site) -> Result<PingReply, ConnectorError> {
        self.ping.lock().unwrap().clone().unwrap_or_else(|| {
            Ok(PingReply {
                message: Some("pong".into()),
                wp_version: Some("6.5.2".into()),
            })
        })
    }
}

/// In-memory wiring of every port behind an [`AppContext`], for router tests.
pub struct TestApp {
    pub sites: Arc<MemorySites>,
    pub associations: Arc<MemoryAssociations>,
    pub catalog: Arc<MemoryCatalog>,
    pub activity: Arc<MemoryActivityLog>,
    pub connector: Arc<ScriptedConnector>,
    pub ctx: AppContext,
}

impl TestApp {
    pub fn new(sites: Vec<Site>) -> Self {
        let sites = Arc::new(MemorySites::new(sites));
        let associations = Arc::new(MemoryAssociations::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let activity = Arc::new(MemoryActivityLog::new());
        let connector = Arc::new(ScriptedConnector::new());
        let (events, _) = broadcast::channel(64);
        let services = AppServices::new(
            sites.clone(),
            associations.clone(),
            catalog.clone(),
            Arc::new(BroadcastActivityLog::new(activity.clone(), events.clone())),
            connector.clone(),
            events,
        );
        let ctx = AppContext::new(Config::for_tests(), services);
        Self {
            sites,
            associations,
            catalog,
            activity,
            connector,
            ctx,
        }
    }

    pub fn bearer(&self) -> String {
        format!(
            "Bearer {}",
            crate::presentation::http::auth::issue_test_token(&self.ctx.cfg, "operator-1")
        )
    }
}

/// Sends one request through `router` and decodes the JSON body (`Null` when empty).
pub async fn call_json(
    router: axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<serde_json::Value>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let mut req = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        req = req.header("authorization", auth);
    }
    let req = match body {
        Some(json) => req
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}
