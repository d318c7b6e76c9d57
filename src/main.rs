use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::MatchedPath;
use dotenvy::dotenv;
use http::HeaderValue;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use wphub::application::ports::activity_log::ActivityLog;
use wphub::bootstrap::app_context::{AppContext, AppServices};
use wphub::bootstrap::config::Config;
use wphub::infrastructure::audit::broadcast_activity_log::BroadcastActivityLog;
use wphub::infrastructure::connector::reqwest_client::ReqwestConnectorClient;
use wphub::infrastructure::db::repositories::activity_log_sqlx::SqlxActivityLog;
use wphub::infrastructure::db::repositories::artifact_catalog_sqlx::SqlxArtifactCatalog;
use wphub::infrastructure::db::repositories::association_repository_sqlx::SqlxAssociationRepository;
use wphub::infrastructure::db::repositories::site_repository_sqlx::SqlxSiteRepository;

#[derive(OpenApi)]
#[openapi(
        paths(
            wphub::presentation::http::health::health,
            wphub::presentation::http::connector::get_commands,
            wphub::presentation::http::connector::report_command_status,
            wphub::presentation::http::connector::sync_site_data,
            wphub::presentation::http::sites::list_site_artifacts,
            wphub::presentation::http::sites::enable_artifact,
            wphub::presentation::http::sites::disable_artifact,
            wphub::presentation::http::sites::request_change,
            wphub::presentation::http::sites::execute_action,
            wphub::presentation::http::sites::list_site_commands,
            wphub::presentation::http::sites::sync_site,
            wphub::presentation::http::sites::ping_site,
            wphub::presentation::http::fleet::sync_fleet,
            wphub::presentation::http::events::reconcile_events,
        ),
        components(schemas(
            wphub::presentation::http::health::HealthResp,
            wphub::presentation::http::connector::GetCommandsRequest,
            wphub::presentation::http::connector::GetCommandsResponse,
            wphub::presentation::http::connector::CommandItem,
            wphub::presentation::http::connector::ReportStatusRequest,
            wphub::presentation::http::connector::ConnectorAck,
            wphub::presentation::http::connector::ReportedArtifact,
            wphub::presentation::http::connector::SyncSiteDataRequest,
            wphub::presentation::http::connector::SyncSiteDataResponse,
            wphub::presentation::http::sites::SiteArtifactResponse,
            wphub::presentation::http::sites::EnableArtifactRequest,
            wphub::presentation::http::sites::RequestChangeRequest,
            wphub::presentation::http::sites::ExecuteActionRequest,
            wphub::presentation::http::sites::ExecuteActionResponse,
            wphub::presentation::http::sites::SiteSyncResponse,
            wphub::presentation::http::sites::ConnectionTestResponse,
            wphub::presentation::http::fleet::FleetReportResponse,
            wphub::application::services::reconciler::ListingSummary,
            wphub::domain::artifacts::artifact::ArtifactKind,
            wphub::domain::associations::association::ArtifactStatus,
            wphub::domain::associations::association::AssociationOrigin,
            wphub::domain::commands::command::ActionKind,
        )),
        tags(
            (name = "Connector", description = "Endpoints called by the agent plugin on each site"),
            (name = "Sites", description = "Per-site artifact management"),
            (name = "Fleet", description = "Fleet-wide reconciliation"),
            (name = "Events", description = "Live reconciliation events"),
            (name = "Health", description = "System health checks")
        )
    )]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "wphub=debug,axum=info,tower_http=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(
        api_port = cfg.api_port,
        fleet_concurrency = cfg.fleet_concurrency,
        fleet_sync_interval_secs = cfg.fleet_sync_interval_secs,
        connector_timeout_secs = cfg.connector_timeout_secs,
        is_production = cfg.is_production,
        "Starting wphub"
    );

    // Database
    let max_connections = (cfg.fleet_concurrency as u32 * 2).max(10);
    let pool = wphub::infrastructure::db::connect_pool(&cfg.database_url, max_connections).await?;
    wphub::infrastructure::db::migrate(&pool).await?;

    let (events, _) = broadcast::channel(1024);
    let durable_log: Arc<dyn ActivityLog> = Arc::new(SqlxActivityLog::new(pool.clone()));
    let activity_log = Arc::new(BroadcastActivityLog::new(durable_log, events.clone()));
    let connector = Arc::new(ReqwestConnectorClient::new(
        Duration::from_secs(cfg.connector_timeout_secs),
        &cfg.connector_path_prefix,
    )?);

    let services = AppServices::new(
        Arc::new(SqlxSiteRepository::new(pool.clone())),
        Arc::new(SqlxAssociationRepository::new(pool.clone())),
        Arc::new(SqlxArtifactCatalog::new(pool.clone())),
        activity_log,
        connector,
        events,
    );
    let ctx = AppContext::new(cfg.clone(), services);
    let shutdown = ctx.shutdown_token();

    let methods = [http::Method::GET, http::Method::POST, http::Method::OPTIONS];
    let headers = [http::header::CONTENT_TYPE, http::header::AUTHORIZATION];
    let cors = match cfg.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true),
        _ if cfg.is_production => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(HeaderValue::from_static("http://invalid")))
            .allow_methods(methods)
            .allow_headers(headers),
        _ => CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true),
    };

    let api_router = Router::new()
        .nest(
            "/api",
            wphub::presentation::http::health::routes(pool.clone()),
        )
        .nest(
            "/api",
            wphub::presentation::http::connector::routes(ctx.clone()),
        )
        .nest("/api", wphub::presentation::http::sites::routes(ctx.clone()))
        .nest("/api", wphub::presentation::http::fleet::routes(ctx.clone()))
        .nest(
            "/api",
            wphub::presentation::http::events::routes(ctx.clone()),
        )
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    let app = api_router.layer(
        TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
            let method = req.method().clone();
            let uri = req.uri().clone();
            let matched = req
                .extensions()
                .get::<MatchedPath>()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            tracing::info_span!("http", %method, %uri, matched_path = %matched)
        }),
    );

    let api_addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%api_addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;

    let server_shutdown = shutdown.clone();
    let api_handle: JoinHandle<anyhow::Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await?;
        Ok(())
    });

    // Background fleet reconcile
    let fleet_handle: Option<JoinHandle<()>> = if cfg.fleet_sync_interval_secs == 0 {
        info!("fleet_sync_loop_disabled");
        None
    } else {
        let loop_ctx = ctx.clone();
        let cancel = shutdown.clone();
        let period = Duration::from_secs(cfg.fleet_sync_interval_secs);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = loop_ctx.fleet_sync().run(cancel.child_token()).await {
                    tracing::error!(error = ?e, "fleet_sync_loop_failed");
                }
                loop_ctx.locks().prune_idle();
            }
            info!("fleet_sync_loop_stopped");
        }))
    };

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(?e, "API server task failed"),
        Err(e) => error!(?e, "API server task panicked"),
    }

    if let Some(handle) = fleet_handle {
        if let Err(e) = handle.await {
            error!(?e, "Fleet sync task panicked");
        }
    }
    Ok(())
}
