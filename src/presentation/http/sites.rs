use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::dto::associations::AssociationDto;
use crate::application::dto::sync::{ConnectionTestDto, SiteSyncResultDto};
use crate::application::services::reconciler::{FoldResult, ListingSummary, ReconcileError};
use crate::application::use_cases::associations::AssociationChangeError;
use crate::application::use_cases::associations::disable_for_site::DisableForSite;
use crate::application::use_cases::associations::enable_for_site::EnableForSite;
use crate::application::use_cases::associations::list_for_site::ListSiteAssociations;
use crate::application::use_cases::associations::request_change::RequestChange;
use crate::application::use_cases::commands::execute_action::{
    ExecuteAction, ExecuteActionError,
};
use crate::application::use_cases::commands::get_commands::GetSiteCommands;
use crate::application::use_cases::sync::sync_site::SyncSite;
use crate::application::use_cases::sync::test_connection::TestConnection;
use crate::bootstrap::app_context::AppContext;
use crate::domain::artifacts::artifact::ArtifactKind;
use crate::domain::associations::association::{ArtifactStatus, AssociationOrigin};
use crate::domain::commands::command::ActionKind;
use crate::domain::sites::site::Site;
use crate::presentation::http::auth::{self, Bearer};
use crate::presentation::http::connector::CommandItem;

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/sites/:site_id/artifacts", get(list_site_artifacts))
        .route(
            "/sites/:site_id/artifacts/:artifact_id/enable",
            post(enable_artifact),
        )
        .route(
            "/sites/:site_id/artifacts/:artifact_id/disable",
            post(disable_artifact),
        )
        .route(
            "/sites/:site_id/artifacts/:artifact_id/request",
            post(request_change),
        )
        .route(
            "/sites/:site_id/artifacts/:artifact_id/execute",
            post(execute_action),
        )
        .route("/sites/:site_id/commands", get(list_site_commands))
        .route("/sites/:site_id/sync", post(sync_site))
        .route("/sites/:site_id/ping", post(ping_site))
        .with_state(ctx)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SiteArtifactResponse {
    pub id: Uuid,
    pub site_id: Uuid,
    pub artifact_id: Uuid,
    pub kind: ArtifactKind,
    pub slug: String,
    pub name: String,
    pub is_enabled: bool,
    pub requested_version: Option<String>,
    pub installed_version: Option<String>,
    pub is_active: bool,
    pub status: ArtifactStatus,
    pub origin: AssociationOrigin,
    pub revision: i64,
    pub last_error: Option<String>,
    pub last_sync: DateTime<Utc>,
}

impl From<AssociationDto> for SiteArtifactResponse {
    fn from(dto: AssociationDto) -> Self {
        Self {
            id: dto.id,
            site_id: dto.site_id,
            artifact_id: dto.artifact_id,
            kind: dto.kind,
            slug: dto.slug,
            name: dto.name,
            is_enabled: dto.is_enabled,
            requested_version: dto.requested_version,
            installed_version: dto.installed_version,
            is_active: dto.is_active,
            status: dto.status,
            origin: dto.origin,
            revision: dto.revision,
            last_error: dto.last_error,
            last_sync: dto.last_sync,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EnableArtifactRequest {
    /// Defaults to the latest release.
    pub requested_version: Option<String>,
    /// Activate after install. Defaults to true.
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RequestChangeRequest {
    pub version: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ExecuteActionRequest {
    /// Run the outstanding diff command when omitted.
    pub action: Option<ActionKind>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecuteActionResponse {
    pub action: ActionKind,
    pub success: bool,
    pub new_version: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    /// False when the result was discarded because the association moved on meanwhile.
    pub applied: bool,
    pub status: Option<ArtifactStatus>,
    pub installed_version: Option<String>,
    pub revision: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SiteSyncResponse {
    pub site_id: Uuid,
    pub site_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub wp_version: Option<String>,
    pub listings: Vec<ListingSummary>,
}

impl From<SiteSyncResultDto> for SiteSyncResponse {
    fn from(dto: SiteSyncResultDto) -> Self {
        Self {
            site_id: dto.site_id,
            site_name: dto.site_name,
            success: dto.success,
            error: dto.error,
            wp_version: dto.wp_version,
            listings: dto.listings,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionTestResponse {
    pub site_id: Uuid,
    pub success: bool,
    pub message: Option<String>,
    pub wp_version: Option<String>,
}

impl From<ConnectionTestDto> for ConnectionTestResponse {
    fn from(dto: ConnectionTestDto) -> Self {
        Self {
            site_id: dto.site_id,
            success: dto.success,
            message: dto.message,
            wp_version: dto.wp_version,
        }
    }
}

fn change_status(err: AssociationChangeError) -> StatusCode {
    match err {
        AssociationChangeError::SiteNotFound
        | AssociationChangeError::ArtifactNotFound
        | AssociationChangeError::AssociationNotFound => StatusCode::NOT_FOUND,
        AssociationChangeError::UnknownVersion(_) => StatusCode::BAD_REQUEST,
        AssociationChangeError::Disabled | AssociationChangeError::Conflict => {
            StatusCode::CONFLICT
        }
        AssociationChangeError::Load(e) | AssociationChangeError::Persist(e) => {
            tracing::error!(error = ?e, "association_change_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn execute_status(err: ExecuteActionError) -> StatusCode {
    match err {
        ExecuteActionError::SiteNotFound
        | ExecuteActionError::AssociationNotFound
        | ExecuteActionError::Reconcile(ReconcileError::NotFound) => StatusCode::NOT_FOUND,
        ExecuteActionError::NothingToDo => StatusCode::CONFLICT,
        ExecuteActionError::MissingRelease(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExecuteActionError::Load(e) => {
            tracing::error!(error = ?e, "execute_action_load_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ExecuteActionError::Reconcile(e) => {
            tracing::error!(error = ?e, "execute_action_fold_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn load_site(ctx: &AppContext, site_id: Uuid) -> Result<Site, StatusCode> {
    ctx.site_repo()
        .get(site_id)
        .await
        .map_err(|e| {
            tracing::error!(site_id = %site_id, error = ?e, "site_lookup_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

#[utoipa::path(
    get,
    path = "/api/sites/{site_id}/artifacts",
    tag = "Sites",
    params(("site_id" = Uuid, Path, description = "Site ID")),
    responses((status = 200, body = [SiteArtifactResponse]))
)]
pub async fn list_site_artifacts(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path(site_id): Path<Uuid>,
) -> Result<Json<Vec<SiteArtifactResponse>>, StatusCode> {
    auth::user_actor(&ctx.cfg, bearer)?;
    let sites = ctx.site_repo();
    let catalog = ctx.artifact_catalog();
    let associations = ctx.association_repo();
    let uc = ListSiteAssociations {
        sites: sites.as_ref(),
        catalog: catalog.as_ref(),
        associations: associations.as_ref(),
    };
    let items = uc.execute(site_id).await.map_err(change_status)?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/sites/{site_id}/artifacts/{artifact_id}/enable",
    tag = "Sites",
    request_body = EnableArtifactRequest,
    params(
        ("site_id" = Uuid, Path, description = "Site ID"),
        ("artifact_id" = Uuid, Path, description = "Artifact ID")
    ),
    responses((status = 200, body = SiteArtifactResponse))
)]
pub async fn enable_artifact(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path((site_id, artifact_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<EnableArtifactRequest>>,
) -> Result<Json<SiteArtifactResponse>, StatusCode> {
    let actor = auth::user_actor(&ctx.cfg, bearer)?;
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let sites = ctx.site_repo();
    let catalog = ctx.artifact_catalog();
    let associations = ctx.association_repo();
    let activity = ctx.activity_log();
    let uc = EnableForSite {
        sites: sites.as_ref(),
        catalog: catalog.as_ref(),
        associations: associations.as_ref(),
        activity: activity.as_ref(),
        locks: ctx.locks(),
    };
    let dto = uc
        .execute(
            &actor,
            site_id,
            artifact_id,
            req.requested_version,
            req.active.unwrap_or(true),
        )
        .await
        .map_err(change_status)?;
    Ok(Json(dto.into()))
}

#[utoipa::path(
    post,
    path = "/api/sites/{site_id}/artifacts/{artifact_id}/disable",
    tag = "Sites",
    params(
        ("site_id" = Uuid, Path, description = "Site ID"),
        ("artifact_id" = Uuid, Path, description = "Artifact ID")
    ),
    responses((status = 200, body = SiteArtifactResponse))
)]
pub async fn disable_artifact(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path((site_id, artifact_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SiteArtifactResponse>, StatusCode> {
    let actor = auth::user_actor(&ctx.cfg, bearer)?;
    let catalog = ctx.artifact_catalog();
    let associations = ctx.association_repo();
    let activity = ctx.activity_log();
    let uc = DisableForSite {
        catalog: catalog.as_ref(),
        associations: associations.as_ref(),
        activity: activity.as_ref(),
        locks: ctx.locks(),
    };
    let dto = uc
        .execute(&actor, site_id, artifact_id)
        .await
        .map_err(change_status)?;
    Ok(Json(dto.into()))
}

#[utoipa::path(
    post,
    path = "/api/sites/{site_id}/artifacts/{artifact_id}/request",
    tag = "Sites",
    request_body = RequestChangeRequest,
    params(
        ("site_id" = Uuid, Path, description = "Site ID"),
        ("artifact_id" = Uuid, Path, description = "Artifact ID")
    ),
    responses((status = 200, body = SiteArtifactResponse))
)]
pub async fn request_change(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path((site_id, artifact_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<RequestChangeRequest>>,
) -> Result<Json<SiteArtifactResponse>, StatusCode> {
    let actor = auth::user_actor(&ctx.cfg, bearer)?;
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let catalog = ctx.artifact_catalog();
    let associations = ctx.association_repo();
    let activity = ctx.activity_log();
    let uc = RequestChange {
        catalog: catalog.as_ref(),
        associations: associations.as_ref(),
        activity: activity.as_ref(),
        locks: ctx.locks(),
    };
    let dto = uc
        .execute(&actor, site_id, artifact_id, req.version, req.active)
        .await
        .map_err(change_status)?;
    Ok(Json(dto.into()))
}

#[utoipa::path(
    post,
    path = "/api/sites/{site_id}/artifacts/{artifact_id}/execute",
    tag = "Sites",
    request_body = ExecuteActionRequest,
    params(
        ("site_id" = Uuid, Path, description = "Site ID"),
        ("artifact_id" = Uuid, Path, description = "Artifact ID")
    ),
    responses((status = 200, body = ExecuteActionResponse))
)]
pub async fn execute_action(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path((site_id, artifact_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<ExecuteActionRequest>>,
) -> Result<Json<ExecuteActionResponse>, StatusCode> {
    let actor = auth::user_actor(&ctx.cfg, bearer)?;
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let sites = ctx.site_repo();
    let associations = ctx.association_repo();
    let catalog = ctx.artifact_catalog();
    let activity = ctx.activity_log();
    let connector = ctx.connector();
    let uc = ExecuteAction {
        sites: sites.as_ref(),
        associations: associations.as_ref(),
        catalog: catalog.as_ref(),
        activity: activity.as_ref(),
        connector: connector.as_ref(),
        locks: ctx.locks(),
    };
    let result = uc
        .execute(&actor, site_id, artifact_id, req.action)
        .await
        .map_err(execute_status)?;
    let (applied, status, installed_version, revision) = match result.fold {
        FoldResult::Applied(a) => (true, Some(a.status), a.installed_version, a.revision),
        FoldResult::Stale { stored_revision } => (false, None, None, stored_revision),
    };
    Ok(Json(ExecuteActionResponse {
        action: result.action,
        success: result.outcome.success,
        new_version: result.outcome.new_version,
        message: result.outcome.message,
        error: result.outcome.error,
        applied,
        status,
        installed_version,
        revision,
    }))
}

#[utoipa::path(
    get,
    path = "/api/sites/{site_id}/commands",
    tag = "Sites",
    params(("site_id" = Uuid, Path, description = "Site ID")),
    responses((status = 200, body = [CommandItem]))
)]
pub async fn list_site_commands(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path(site_id): Path<Uuid>,
) -> Result<Json<Vec<CommandItem>>, StatusCode> {
    auth::user_actor(&ctx.cfg, bearer)?;
    let site = load_site(&ctx, site_id).await?;
    let associations = ctx.association_repo();
    let catalog = ctx.artifact_catalog();
    let uc = GetSiteCommands {
        associations: associations.as_ref(),
        catalog: catalog.as_ref(),
    };
    let commands = uc.execute(site.id).await.map_err(|e| {
        tracing::error!(site_id = %site.id, error = ?e, "get_commands_failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(commands.iter().map(CommandItem::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/sites/{site_id}/sync",
    tag = "Sites",
    params(("site_id" = Uuid, Path, description = "Site ID")),
    responses((status = 200, body = SiteSyncResponse))
)]
pub async fn sync_site(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path(site_id): Path<Uuid>,
) -> Result<Json<SiteSyncResponse>, StatusCode> {
    auth::user_actor(&ctx.cfg, bearer)?;
    let site = load_site(&ctx, site_id).await?;
    let connector = ctx.connector();
    let associations = ctx.association_repo();
    let catalog = ctx.artifact_catalog();
    let sites = ctx.site_repo();
    let activity = ctx.activity_log();
    let uc = SyncSite {
        connector: connector.as_ref(),
        associations: associations.as_ref(),
        catalog: catalog.as_ref(),
        sites: sites.as_ref(),
        activity: activity.as_ref(),
        locks: ctx.locks(),
    };
    Ok(Json(uc.execute(&site).await.into()))
}

#[utoipa::path(
    post,
    path = "/api/sites/{site_id}/ping",
    tag = "Sites",
    params(("site_id" = Uuid, Path, description = "Site ID")),
    responses((status = 200, body = ConnectionTestResponse))
)]
pub async fn ping_site(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path(site_id): Path<Uuid>,
) -> Result<Json<ConnectionTestResponse>, StatusCode> {
    let actor = auth::user_actor(&ctx.cfg, bearer)?;
    let site = load_site(&ctx, site_id).await?;
    let connector = ctx.connector();
    let sites = ctx.site_repo();
    let activity = ctx.activity_log();
    let uc = TestConnection {
        connector: connector.as_ref(),
        sites: sites.as_ref(),
        activity: activity.as_ref(),
    };
    let dto = uc.execute(&actor, &site).await.map_err(|e| {
        tracing::error!(site_id = %site.id, error = ?e, "connection_test_failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(dto.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::connector_client::ConnectorError;
    use crate::test_support::{TestApp, call_json, remote, site};
    use serde_json::json;

    #[tokio::test]
    async fn requires_bearer_token() {
        let s = site("k");
        let app = TestApp::new(vec![s.clone()]);
        let (status, _) = call_json(
            routes(app.ctx.clone()),
            "GET",
            &format!("/sites/{}/artifacts", s.id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call_json(
            routes(app.ctx.clone()),
            "GET",
            &format!("/sites/{}/artifacts", s.id),
            Some("Bearer not-a-jwt"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn enable_then_push_install() {
        let s = site("k");
        let app = TestApp::new(vec![s.clone()]);
        let artifact = app.catalog.add(ArtifactKind::Plugin, "akismet", &["5.2", "5.3"]);
        let auth = app.bearer();

        let (status, body) = call_json(
            routes(app.ctx.clone()),
            "POST",
            &format!("/sites/{}/artifacts/{}/enable", s.id, artifact.id),
            Some(&auth),
            Some(json!({"active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["slug"], "akismet");

        let (status, body) = call_json(
            routes(app.ctx.clone()),
            "GET",
            &format!("/sites/{}/commands", s.id),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["action"], "install");
        assert_eq!(body[0]["version"], "5.3");

        let (status, body) = call_json(
            routes(app.ctx.clone()),
            "POST",
            &format!("/sites/{}/artifacts/{}/execute", s.id, artifact.id),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "install");
        assert_eq!(body["success"], true);
        assert_eq!(body["applied"], true);
        assert_eq!(body["status"], "installed");
        assert_eq!(body["installed_version"], "5.3");

        let actions = app.activity.actions();
        assert!(actions.contains(&"enabled".to_string()));
        let actor = &app.activity.entries()[0].actor;
        assert_eq!(actor, "user:operator-1");
    }

    #[tokio::test]
    async fn execute_with_nothing_outstanding_conflicts() {
        let s = site("k");
        let app = TestApp::new(vec![s.clone()]);
        let artifact = app.catalog.add(ArtifactKind::Plugin, "akismet", &["5.3"]);
        app.connector
            .listing(s.id, ArtifactKind::Plugin, vec![remote("akismet", "5.3", true)]);
        let auth = app.bearer();
        let (status, body) = call_json(
            routes(app.ctx.clone()),
            "POST",
            &format!("/sites/{}/sync", s.id),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = call_json(
            routes(app.ctx.clone()),
            "POST",
            &format!("/sites/{}/artifacts/{}/execute", s.id, artifact.id),
            Some(&auth),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_site_is_not_found() {
        let app = TestApp::new(vec![]);
        let auth = app.bearer();
        let (status, _) = call_json(
            routes(app.ctx.clone()),
            "POST",
            &format!("/sites/{}/sync", Uuid::new_v4()),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ping_reports_failure_in_body() {
        let s = site("k");
        let app = TestApp::new(vec![s.clone()]);
        app.connector.set_ping(Err(ConnectorError::Timeout));
        let auth = app.bearer();
        let (status, body) = call_json(
            routes(app.ctx.clone()),
            "POST",
            &format!("/sites/{}/ping", s.id),
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "connector call timed out");
    }
}
