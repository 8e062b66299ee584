use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::error::DeskError;
use crate::model::AuditLog;
use crate::store::LeaveDesk;

const DEFAULT_LIMIT: usize = 200;

#[derive(Deserialize, IntoParams)]
pub struct AuditFilter {
    /// Exact action code, e.g. LEAVE_APPROVED
    pub action: Option<String>,
    /// Newest entries to return
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/audit",
    params(AuditFilter),
    responses(
        (status = 200, description = "Audit trail, newest first", body = Object, example = json!([{
            "id": "0f4e9d3c-2b1a-4c8e-9f7d-6a5b4c3d2e1f",
            "action": "LEAVE_APPROVED",
            "performedBy": "Wanjiku",
            "timestamp": "2026-01-01T00:00:00Z",
            "details": "Request ID: 9b2d7c1e-5a44-4f0a-8e3b-6c2f1d0a9e77"
        }])),
        (status = 403, description = "Global tier only")
    ),
    security(("bearer_auth" = [])),
    tag = "Audit"
)]
pub async fn list_audit(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    query: web::Query<AuditFilter>,
) -> Result<HttpResponse, DeskError> {
    auth.require_global()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);

    let mut entries: Vec<AuditLog> = desk.read(|s| {
        s.audit_logs
            .iter()
            .filter(|e| query.action.as_deref().is_none_or(|a| e.action == a))
            .cloned()
            .collect()
    });
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries.truncate(limit);

    Ok(HttpResponse::Ok().json(entries))
}
