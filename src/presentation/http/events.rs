use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::auth::{self, Bearer};

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/events", get(reconcile_events))
        .with_state(ctx)
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Only stream events for this site.
    pub site_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/events",
    tag = "Events",
    params(EventsQuery),
    responses((status = 200, description = "Reconciliation event stream", content_type = "text/event-stream"))
)]
pub async fn reconcile_events(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Query(q): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, StatusCode> {
    auth::validate_bearer(&ctx.cfg, bearer)?;

    let initial = stream::iter(vec![Ok(Event::default().event("ready").data("{}"))]);
    let site_filter = q.site_id;
    let updates = ctx.subscribe_events().filter_map(move |ev| async move {
        if site_filter.is_some_and(|id| id != ev.entry.site_id) {
            return None;
        }
        match serde_json::to_string(&ev) {
            Ok(payload) => Some(Ok(Event::default().event(ev.entry.action.clone()).data(payload))),
            Err(e) => {
                tracing::warn!(error = ?e, "reconcile_event_encode_failed");
                None
            }
        }
    });
    let keepalive = KeepAlive::new()
        .interval(Duration::from_secs(25))
        .text(":\n");
    Ok(Sse::new(initial.chain(updates)).keep_alive(keepalive))
}
