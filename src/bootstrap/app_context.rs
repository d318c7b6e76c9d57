use std::sync::Arc;

use futures_util::{StreamExt, stream::BoxStream};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::application::ports::activity_log::ActivityLog;
use crate::application::ports::artifact_catalog::ArtifactCatalog;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::connector_client::ConnectorClient;
use crate::application::ports::site_repository::SiteRepository;
use crate::application::services::fleet::FleetSync;
use crate::application::services::locks::AssociationLocks;
use crate::bootstrap::config::Config;
use crate::infrastructure::audit::broadcast_activity_log::ReconcileEvent;

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

#[derive(Clone)]
pub struct AppServices {
    site_repo: Arc<dyn SiteRepository>,
    association_repo: Arc<dyn AssociationRepository>,
    artifact_catalog: Arc<dyn ArtifactCatalog>,
    activity_log: Arc<dyn ActivityLog>,
    connector: Arc<dyn ConnectorClient>,
    locks: AssociationLocks,
    events: broadcast::Sender<ReconcileEvent>,
    shutdown: CancellationToken,
}

impl AppServices {
    pub fn new(
        site_repo: Arc<dyn SiteRepository>,
        association_repo: Arc<dyn AssociationRepository>,
        artifact_catalog: Arc<dyn ArtifactCatalog>,
        activity_log: Arc<dyn ActivityLog>,
        connector: Arc<dyn ConnectorClient>,
        events: broadcast::Sender<ReconcileEvent>,
    ) -> Self {
        Self {
            site_repo,
            association_repo,
            artifact_catalog,
            activity_log,
            connector,
            locks: AssociationLocks::new(),
            events,
            shutdown: CancellationToken::new(),
        }
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn site_repo(&self) -> Arc<dyn SiteRepository> {
        self.services.site_repo.clone()
    }

    pub fn association_repo(&self) -> Arc<dyn AssociationRepository> {
        self.services.association_repo.clone()
    }

    pub fn artifact_catalog(&self) -> Arc<dyn ArtifactCatalog> {
        self.services.artifact_catalog.clone()
    }

    pub fn activity_log(&self) -> Arc<dyn ActivityLog> {
        self.services.activity_log.clone()
    }

    pub fn connector(&self) -> Arc<dyn ConnectorClient> {
        self.services.connector.clone()
    }

    pub fn locks(&self) -> &AssociationLocks {
        &self.services.locks
    }

    pub fn subscribe_events(&self) -> BoxStream<'static, ReconcileEvent> {
        BroadcastStream::new(self.services.events.subscribe())
            .filter_map(|evt| async move { evt.ok() })
            .boxed()
    }

    /// Cancelled once the process starts shutting down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.services.shutdown.clone()
    }

    pub fn fleet_sync(&self) -> FleetSync {
        FleetSync {
            connector: self.connector(),
            associations: self.association_repo(),
            catalog: self.artifact_catalog(),
            sites: self.site_repo(),
            activity: self.activity_log(),
            locks: self.locks().clone(),
            concurrency: self.cfg.fleet_concurrency,
        }
    }
}
