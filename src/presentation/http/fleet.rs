use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Serialize;
use utoipa::ToSchema;

use crate::application::dto::sync::FleetReportDto;
use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::auth::{self, Bearer};
use crate::presentation::http::sites::SiteSyncResponse;

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/fleet/sync", post(sync_fleet))
        .with_state(ctx)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FleetReportResponse {
    pub total_sites: usize,
    pub successful_sites: usize,
    pub failed_sites: usize,
    pub skipped_sites: usize,
    pub cancelled: bool,
    pub site_results: Vec<SiteSyncResponse>,
}

impl From<FleetReportDto> for FleetReportResponse {
    fn from(dto: FleetReportDto) -> Self {
        Self {
            total_sites: dto.total_sites,
            successful_sites: dto.successful_sites,
            failed_sites: dto.failed_sites,
            skipped_sites: dto.skipped_sites,
            cancelled: dto.cancelled,
            site_results: dto.site_results.into_iter().map(Into::into).collect(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/fleet/sync",
    tag = "Fleet",
    responses((status = 200, body = FleetReportResponse))
)]
pub async fn sync_fleet(
    State(ctx): State<AppContext>,
    bearer: Bearer,
) -> Result<Json<FleetReportResponse>, StatusCode> {
    let actor = auth::user_actor(&ctx.cfg, bearer)?;
    tracing::info!(actor = %actor, "fleet_sync_requested");
    let report = ctx
        .fleet_sync()
        .run(ctx.shutdown_token().child_token())
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "fleet_sync_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(report.into()))
}
