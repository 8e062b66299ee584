use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::engine::Action;
use crate::error::{DeskError, TransitionError};
use crate::model::{ResetRequest, ResetRequestId, ResetStatus};
use crate::store::LeaveDesk;

#[derive(Deserialize, IntoParams)]
pub struct ResetFilter {
    /// Include resolved tickets
    pub all: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/reset-requests",
    params(ResetFilter),
    responses(
        (status = 200, description = "PIN recovery tickets, oldest first", body = Object, example = json!([{
            "id": "5c7e1a2b-93f0-4d7e-a1c4-2b8f6e0d3a91",
            "userName": "Otieno",
            "department": "Sales",
            "status": "PENDING",
            "createdAt": "2026-01-01T00:00:00Z"
        }])),
        (status = 403, description = "Global tier only")
    ),
    security(("bearer_auth" = [])),
    tag = "Recovery"
)]
pub async fn list_reset_requests(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    query: web::Query<ResetFilter>,
) -> Result<HttpResponse, DeskError> {
    auth.require_global()?;
    let include_resolved = query.all.unwrap_or(false);

    let mut tickets: Vec<ResetRequest> = desk.read(|s| {
        s.reset_requests
            .iter()
            .filter(|r| include_resolved || r.status == ResetStatus::Pending)
            .cloned()
            .collect()
    });
    tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(HttpResponse::Ok().json(tickets))
}

#[utoipa::path(
    put,
    path = "/api/reset-requests/{reset_id}/resolve",
    params(("reset_id" = String, Path, description = "Ticket to close")),
    responses(
        (status = 200, description = "Ticket resolved", body = Object),
        (status = 403, description = "Global tier only, or already resolved"),
        (status = 404, description = "Unknown ticket")
    ),
    security(("bearer_auth" = [])),
    tag = "Recovery"
)]
pub async fn resolve_reset_request(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
) -> Result<HttpResponse, DeskError> {
    let reset_id = ResetRequestId::from(path.into_inner());
    let transition = desk.dispatch(Action::ResolveResetRequest {
        actor: auth.user_id.clone(),
        reset_id: reset_id.clone(),
    })?;

    let ticket = transition
        .state
        .reset_request(&reset_id)
        .cloned()
        .ok_or_else(|| TransitionError::UnknownResetRequest(reset_id.to_string()))?;
    Ok(HttpResponse::Ok().json(ticket))
}
