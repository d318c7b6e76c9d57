use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::access::{ConnectorAuthError, authenticate_site};
use crate::application::services::reconciler::{
    FoldResult, ListingSummary, ReconcileError, StatusReport,
};
use crate::application::use_cases::commands::get_commands::GetSiteCommands;
use crate::application::use_cases::commands::report_status::ReportCommandStatus;
use crate::application::use_cases::sync::apply_reported_listing::ApplyReportedListing;
use crate::bootstrap::app_context::AppContext;
use crate::domain::artifacts::artifact::ArtifactKind;
use crate::domain::artifacts::listing::{RemoteArtifact, RemoteListing};
use crate::domain::commands::command::{ActionKind, Command};
use crate::domain::sites::site::Site;

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/connector/getCommands", post(get_commands))
        .route("/connector/reportCommandStatus", post(report_command_status))
        .route("/connector/syncSiteData", post(sync_site_data))
        .with_state(ctx)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GetCommandsRequest {
    pub api_key: String,
}

/// A pending command as the agent consumes it. `installation_id` identifies the association.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandItem {
    pub installation_id: Uuid,
    pub plugin_slug: String,
    pub kind: ArtifactKind,
    pub action: ActionKind,
    pub version: Option<String>,
    pub file_url: Option<String>,
    pub revision: i64,
}

impl From<&Command> for CommandItem {
    fn from(cmd: &Command) -> Self {
        Self {
            installation_id: cmd.association_id,
            plugin_slug: cmd.slug.clone(),
            kind: cmd.kind,
            action: cmd.action.kind(),
            version: cmd.action.target_version().map(str::to_string),
            file_url: cmd.action.download_url().map(str::to_string),
            revision: cmd.revision,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GetCommandsResponse {
    pub success: bool,
    pub commands: Vec<CommandItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportStatusRequest {
    pub api_key: String,
    pub installation_id: Uuid,
    /// installed | active | inactive | uninstalled | error
    pub status: String,
    pub version: Option<String>,
    pub error_message: Option<String>,
    pub revision: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectorAck {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportedArtifact {
    pub slug: String,
    pub name: Option<String>,
    pub version: String,
    /// `active` or `inactive`
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncSiteDataRequest {
    pub api_key: String,
    pub wp_version: Option<String>,
    pub plugins: Option<Vec<ReportedArtifact>>,
    pub themes: Option<Vec<ReportedArtifact>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncSiteDataResponse {
    pub success: bool,
    pub message: String,
    pub listings: Vec<ListingSummary>,
}

type Failure = (StatusCode, Json<ConnectorAck>);

fn failure(status: StatusCode, message: impl Into<String>) -> Failure {
    (
        status,
        Json(ConnectorAck {
            success: false,
            message: message.into(),
        }),
    )
}

async fn authenticate(ctx: &AppContext, api_key: &str) -> Result<Site, Failure> {
    let sites = ctx.site_repo();
    authenticate_site(sites.as_ref(), api_key)
        .await
        .map_err(|err| match err {
            ConnectorAuthError::Unauthenticated => {
                tracing::warn!("connector_auth_rejected");
                failure(StatusCode::UNAUTHORIZED, "invalid api key")
            }
            ConnectorAuthError::Misconfigured(_) => failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "api key is not unique; contact the platform operator",
            ),
            ConnectorAuthError::Lookup(e) => {
                tracing::error!(error = ?e, "connector_auth_lookup_failed");
                failure(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        })
}

fn reconcile_failure(err: ReconcileError) -> Failure {
    match err {
        ReconcileError::NotFound | ReconcileError::ForeignAssociation => {
            failure(StatusCode::NOT_FOUND, "installation not found")
        }
        ReconcileError::UnknownStatus(status) => {
            failure(StatusCode::BAD_REQUEST, format!("unknown status: {status}"))
        }
        ReconcileError::Load(e) | ReconcileError::Persist(e) => {
            tracing::error!(error = ?e, "connector_reconcile_failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn listing_from(kind: ArtifactKind, items: Vec<ReportedArtifact>) -> RemoteListing {
    let artifacts = items
        .into_iter()
        .map(|item| RemoteArtifact {
            is_active: item.status == "active",
            slug: item.slug,
            name: item.name,
            version: item.version,
        })
        .collect();
    RemoteListing::new(kind, artifacts)
}

#[utoipa::path(
    post,
    path = "/api/connector/getCommands",
    tag = "Connector",
    request_body = GetCommandsRequest,
    security(()),
    responses(
        (status = 200, body = GetCommandsResponse),
        (status = 401, body = ConnectorAck)
    )
)]
pub async fn get_commands(
    State(ctx): State<AppContext>,
    Json(req): Json<GetCommandsRequest>,
) -> Result<Json<GetCommandsResponse>, Failure> {
    let site = authenticate(&ctx, &req.api_key).await?;
    let associations = ctx.association_repo();
    let catalog = ctx.artifact_catalog();
    let uc = GetSiteCommands {
        associations: associations.as_ref(),
        catalog: catalog.as_ref(),
    };
    let commands = uc.execute(site.id).await.map_err(|e| {
        tracing::error!(site_id = %site.id, error = ?e, "get_commands_failed");
        failure(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })?;
    Ok(Json(GetCommandsResponse {
        success: true,
        commands: commands.iter().map(CommandItem::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/connector/reportCommandStatus",
    tag = "Connector",
    request_body = ReportStatusRequest,
    security(()),
    responses(
        (status = 200, body = ConnectorAck),
        (status = 400, body = ConnectorAck),
        (status = 401, body = ConnectorAck),
        (status = 404, body = ConnectorAck)
    )
)]
pub async fn report_command_status(
    State(ctx): State<AppContext>,
    Json(req): Json<ReportStatusRequest>,
) -> Result<Json<ConnectorAck>, Failure> {
    let site = authenticate(&ctx, &req.api_key).await?;
    let report = StatusReport {
        association_id: req.installation_id,
        status: req.status,
        version: req.version,
        error_message: req.error_message,
        revision: req.revision,
    };
    let associations = ctx.association_repo();
    let catalog = ctx.artifact_catalog();
    let sites = ctx.site_repo();
    let activity = ctx.activity_log();
    let uc = ReportCommandStatus {
        associations: associations.as_ref(),
        catalog: catalog.as_ref(),
        sites: sites.as_ref(),
        activity: activity.as_ref(),
        locks: ctx.locks(),
    };
    let message = match uc.execute(&site, &report).await.map_err(reconcile_failure)? {
        FoldResult::Applied(association) => {
            format!("status recorded: {}", association.status.as_str())
        }
        FoldResult::Stale { .. } => "report superseded by a newer state; ignored".to_string(),
    };
    Ok(Json(ConnectorAck {
        success: true,
        message,
    }))
}

#[utoipa::path(
    post,
    path = "/api/connector/syncSiteData",
    tag = "Connector",
    request_body = SyncSiteDataRequest,
    security(()),
    responses(
        (status = 200, body = SyncSiteDataResponse),
        (status = 401, body = ConnectorAck)
    )
)]
pub async fn sync_site_data(
    State(ctx): State<AppContext>,
    Json(req): Json<SyncSiteDataRequest>,
) -> Result<Json<SyncSiteDataResponse>, Failure> {
    let site = authenticate(&ctx, &req.api_key).await?;
    // Only kinds the agent actually sent are authoritative.
    let mut listings = Vec::new();
    if let Some(plugins) = req.plugins {
        listings.push(listing_from(ArtifactKind::Plugin, plugins));
    }
    if let Some(themes) = req.themes {
        listings.push(listing_from(ArtifactKind::Theme, themes));
    }

    let associations = ctx.association_repo();
    let catalog = ctx.artifact_catalog();
    let sites = ctx.site_repo();
    let activity = ctx.activity_log();
    let uc = ApplyReportedListing {
        associations: associations.as_ref(),
        catalog: catalog.as_ref(),
        sites: sites.as_ref(),
        activity: activity.as_ref(),
        locks: ctx.locks(),
    };
    let summaries = uc
        .execute(&site, req.wp_version.as_deref(), &listings)
        .await
        .map_err(reconcile_failure)?;
    Ok(Json(SyncSiteDataResponse {
        success: true,
        message: format!("{} listing(s) reconciled", summaries.len()),
        listings: summaries,
    }))
}
