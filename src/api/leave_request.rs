use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::advisory::Advisor;
use crate::api::current_user;
use crate::auth::auth::AuthUser;
use crate::auth::policy::can_view_request;
use crate::engine::{Action, Evaluation, Subject, evaluate};
use crate::error::{DeskError, TransitionError, ValidationError};
use crate::model::{
    AppState, Branch, Department, LeaveDates, LeaveRequest, LeaveStatus, LeaveType, RequestId,
    UserId,
};
use crate::store::LeaveDesk;

const DEFAULT_PER_PAGE: u64 = 10;
const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveView {
    #[schema(example = "9b2d7c1e-5a44-4f0a-8e3b-6c2f1d0a9e77", value_type = String)]
    pub id: RequestId,
    #[schema(value_type = String)]
    pub user_id: UserId,
    #[schema(example = "Otieno")]
    pub user_name: String,
    #[schema(example = "Sales", value_type = String)]
    pub department: Department,
    #[schema(example = "NAIVASHA BRANCH", value_type = String)]
    pub branch: Branch,
    #[schema(example = "Annual Leave", value_type = String)]
    pub leave_type: LeaveType,
    #[schema(example = json!(["2026-03-02", "2026-03-03"]), value_type = Vec<String>)]
    pub dates: Vec<NaiveDate>,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = 2)]
    pub days: i32,
    pub reason: String,
    #[schema(example = "Pending", value_type = String)]
    pub status: LeaveStatus,
    pub manager_comment: Option<String>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<&LeaveRequest> for LeaveView {
    fn from(r: &LeaveRequest) -> Self {
        Self {
            id: r.id.clone(),
            user_id: r.user_id.clone(),
            user_name: r.user_name.clone(),
            department: r.department,
            branch: r.branch,
            leave_type: r.leave_type,
            dates: r.dates.iter().copied().collect(),
            start_date: r.start_date(),
            end_date: r.end_date(),
            days: r.dates.days(),
            reason: r.reason.clone(),
            status: r.status,
            manager_comment: r.manager_comment.clone(),
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveView>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: usize,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = "Pending", value_type = Option<String>)]
    #[param(value_type = Option<String>)]
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    #[schema(example = "NAIVASHA BRANCH", value_type = Option<String>)]
    #[param(value_type = Option<String>)]
    /// Filter by branch
    pub branch: Option<Branch>,
    #[schema(value_type = Option<String>)]
    #[param(value_type = Option<String>)]
    /// Filter by owner
    pub user_id: Option<UserId>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

/// Either an explicit list of days or an inclusive range.
#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "Annual Leave", value_type = String)]
    pub leave_type: LeaveType,
    #[schema(example = json!(["2026-03-02", "2026-03-04"]), value_type = Option<Vec<String>>)]
    pub dates: Option<Vec<NaiveDate>>,
    #[schema(example = "2026-03-02", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-03-06", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = "Family visit")]
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct Reschedule {
    #[schema(example = json!(["2026-03-09", "2026-03-10"]), value_type = Option<Vec<String>>)]
    pub dates: Option<Vec<NaiveDate>>,
    #[schema(format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct Decision {
    #[schema(example = "Enjoy the break")]
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkApprove {
    #[schema(value_type = Vec<String>)]
    pub ids: Vec<RequestId>,
}

#[derive(Serialize, ToSchema)]
pub struct EvaluationResponse {
    pub valid: bool,
    /// valid, insufficient_balance or conflict
    #[schema(example = "valid")]
    pub outcome: &'static str,
    #[schema(example = 21)]
    pub remaining: i32,
    #[schema(example = 5)]
    pub requested: i32,
    #[schema(value_type = Vec<String>)]
    pub conflicts: Vec<RequestId>,
    pub advice: String,
}

fn collect_dates(
    dates: Option<Vec<NaiveDate>>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<LeaveDates, ValidationError> {
    match (dates, start, end) {
        (Some(days), _, _) if !days.is_empty() => LeaveDates::new(days),
        (_, Some(start), Some(end)) => LeaveDates::from_range(start, end),
        (_, Some(day), None) => LeaveDates::new([day]),
        _ => Err(ValidationError::EmptyDates),
    }
}

/// Page from 1, page size clamped to `1..=MAX_PER_PAGE`.
fn paging(page: Option<u64>, per_page: Option<u64>) -> (u64, u64) {
    (
        page.unwrap_or(1).max(1),
        per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
    )
}

/// Offset and limit for a page. Pages past the end are empty.
fn window(page: u64, per_page: u64) -> (usize, usize) {
    let offset = page.saturating_sub(1).saturating_mul(per_page);
    (
        usize::try_from(offset).unwrap_or(usize::MAX),
        usize::try_from(per_page).unwrap_or(usize::MAX),
    )
}

fn view_of(state: &AppState, id: &RequestId) -> Result<LeaveView, DeskError> {
    state
        .request(id)
        .map(LeaveView::from)
        .ok_or_else(|| TransitionError::UnknownRequest(id.clone()).into())
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave application, by explicit days or by range",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveView),
        (status = 400, description = "No dates, inverted range or a date not in the future"),
        (status = 409, description = "Overlaps a team-mate's leave of the same category", body = Object,
         example = json!({
            "error": "dates overlap with 1 existing request(s)",
            "conflicts": ["9b2d7c1e-5a44-4f0a-8e3b-6c2f1d0a9e77"]
         })
        ),
        (status = 422, description = "Insufficient balance", body = Object, example = json!({
            "error": "insufficient balance: 3 days remaining, 10 requested",
            "remaining": 3,
            "requested": 10
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "leave_create", skip(auth, desk, payload), fields(user_id = %auth.user_id))]
pub async fn create_leave(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, DeskError> {
    let payload = payload.into_inner();

    // 1️⃣ validate dates
    let dates = collect_dates(payload.dates, payload.start_date, payload.end_date)?;

    // 2️⃣ balance, conflicts and persistence happen in one transition
    let transition = desk.dispatch(Action::SubmitLeave {
        actor: auth.user_id.clone(),
        leave_type: payload.leave_type,
        dates,
        reason: payload.reason,
    })?;

    let Subject::Request(id) = &transition.subject else {
        return Err(TransitionError::Forbidden("submission produced no request".into()).into());
    };
    info!(request_id = %id, "Leave request submitted");

    Ok(HttpResponse::Created().json(view_of(&transition.state, id)?))
}

/* =========================
Dry-run evaluation with advisory
========================= */
#[utoipa::path(
    post,
    path = "/api/leave/evaluate",
    request_body = CreateLeave,
    responses(
        (status = 200, description = "Outcome the submission would have, plus coverage advice", body = EvaluationResponse),
        (status = 400, description = "No dates or a date not in the future")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn evaluate_leave(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    advisor: web::Data<dyn Advisor>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, DeskError> {
    let payload = payload.into_inner();
    let dates = collect_dates(payload.dates, payload.start_date, payload.end_date)?;
    let today = Utc::now().date_naive();
    if dates.start() <= today {
        return Err(ValidationError::PastDate(dates.start()).into());
    }

    let me = current_user(&desk, &auth)?;
    let requests = desk.read(|s| s.requests.clone());

    let remaining = me.balances.remaining(payload.leave_type);
    let requested = dates.days();
    let (outcome, conflicts) = match evaluate(&me, &dates, payload.leave_type, &requests) {
        Evaluation::Valid => ("valid", Vec::new()),
        Evaluation::InsufficientBalance { .. } => ("insufficient_balance", Vec::new()),
        Evaluation::Conflict(found) => ("conflict", found.into_iter().map(|r| r.id).collect()),
    };

    let advice = advisor
        .advise(&me, dates.start(), dates.end(), &requests)
        .await;

    Ok(HttpResponse::Ok().json(EvaluationResponse {
        valid: outcome == "valid",
        outcome,
        remaining,
        requested,
        conflicts,
        advice,
    }))
}

/* =========================
Approve / reject
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = String, Path, description = "ID of the leave request to approve")),
    request_body(content = Option<Decision>, description = "Optional comment for the applicant"),
    responses(
        (status = 200, description = "Leave approved, balance debited", body = LeaveView),
        (status = 403, description = "Own request or outside the caller's branch"),
        (status = 404, description = "Leave request not found"),
        (status = 422, description = "Balance no longer covers the request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
    payload: Option<web::Json<Decision>>,
) -> Result<HttpResponse, DeskError> {
    decide(auth, desk, path, payload, LeaveStatus::Approved)
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = String, Path, description = "ID of the leave request to reject")),
    request_body(content = Option<Decision>, description = "Optional comment for the applicant"),
    responses(
        (status = 200, description = "Leave rejected, approved days refunded", body = LeaveView),
        (status = 403, description = "Own request or outside the caller's branch"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
    payload: Option<web::Json<Decision>>,
) -> Result<HttpResponse, DeskError> {
    decide(auth, desk, path, payload, LeaveStatus::Rejected)
}

fn decide(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
    payload: Option<web::Json<Decision>>,
    status: LeaveStatus,
) -> Result<HttpResponse, DeskError> {
    let request_id = RequestId::from(path.into_inner());
    let transition = desk.dispatch(Action::UpdateLeaveStatus {
        actor: auth.user_id.clone(),
        request_id: request_id.clone(),
        status,
        comment: payload.and_then(|p| p.into_inner().comment),
    })?;

    Ok(HttpResponse::Ok().json(view_of(&transition.state, &request_id)?))
}

#[utoipa::path(
    put,
    path = "/api/leave/bulk-approve",
    request_body = BulkApprove,
    responses(
        (status = 200, description = "All selected requests approved", body = Object, example = json!({
            "message": "Approved 2 request(s)",
            "ids": ["a1", "b2"]
        })),
        (status = 400, description = "Empty selection"),
        (status = 403, description = "One of the requests may not be managed by the caller"),
        (status = 422, description = "A balance does not cover its request; nothing was approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn bulk_approve(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    payload: web::Json<BulkApprove>,
) -> Result<HttpResponse, DeskError> {
    let transition = desk.dispatch(Action::BulkApprove {
        actor: auth.user_id.clone(),
        request_ids: payload.into_inner().ids,
    })?;

    let ids = match transition.subject {
        Subject::Requests(ids) => ids,
        _ => Vec::new(),
    };
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Approved {} request(s)", ids.len()),
        "ids": ids,
    })))
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/dates",
    params(("leave_id" = String, Path, description = "ID of the leave request to reschedule")),
    request_body = Reschedule,
    responses(
        (status = 200, description = "Dates replaced", body = LeaveView),
        (status = 403, description = "Rejected request or outside the caller's authority"),
        (status = 409, description = "New dates overlap a team-mate's leave"),
        (status = 422, description = "Balance does not cover the longer schedule")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_dates(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
    payload: web::Json<Reschedule>,
) -> Result<HttpResponse, DeskError> {
    let payload = payload.into_inner();
    let request_id = RequestId::from(path.into_inner());
    let dates = collect_dates(payload.dates, payload.start_date, payload.end_date)?;

    let transition = desk.dispatch(Action::UpdateLeaveDates {
        actor: auth.user_id.clone(),
        request_id: request_id.clone(),
        dates,
    })?;

    Ok(HttpResponse::Ok().json(view_of(&transition.state, &request_id)?))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = String, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveView),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found or not visible to the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
) -> Result<HttpResponse, DeskError> {
    let me = current_user(&desk, &auth)?;
    let request_id = RequestId::from(path.into_inner());

    // invisible requests look absent
    let view = desk.read(|s| {
        s.request(&request_id)
            .filter(|r| can_view_request(&me, r))
            .map(LeaveView::from)
    });

    match view {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Err(TransitionError::UnknownRequest(request_id).into()),
    }
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list, newest first", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leaves(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, DeskError> {
    let me = current_user(&desk, &auth)?;

    let (page, per_page) = paging(query.page, query.per_page);
    let (offset, limit) = window(page, per_page);

    let (total, data) = desk.read(|s| {
        let mut visible: Vec<&LeaveRequest> = s
            .requests
            .iter()
            .filter(|r| can_view_request(&me, r))
            .filter(|r| query.status.is_none_or(|st| r.status == st))
            .filter(|r| query.branch.is_none_or(|b| r.branch == b))
            .filter(|r| query.user_id.as_ref().is_none_or(|id| &r.user_id == id))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let data: Vec<LeaveView> = visible
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| LeaveView::from(*r))
            .collect();
        (visible.len(), data)
    });

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page,
        per_page,
        total,
    }))
}
