use std::collections::BTreeMap;

use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::api::current_user;
use crate::auth::auth::AuthUser;
use crate::auth::password::hash_pin;
use crate::engine::{Action, Subject};
use crate::error::{DeskError, TransitionError};
use crate::model::{
    AppState, Balances, Branch, Department, Pin, Registration, Role, User, UserChanges, UserId,
};
use crate::store::LeaveDesk;

/// A user record as shown to clients. The PIN hash never leaves the desk.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserView {
    #[schema(example = "3f1c2a9e-0b8d-4c52-9d61-1f0e4b7a2c11", value_type = String)]
    pub id: UserId,
    #[schema(example = "Otieno")]
    pub name: String,
    #[schema(example = "STAFF", value_type = String)]
    pub role: Role,
    #[schema(example = "Sales", value_type = String)]
    pub department: Department,
    #[schema(example = "NAIVASHA BRANCH", value_type = String)]
    pub branch: Branch,
    pub is_active: bool,
    pub is_approved: bool,
    pub is_blocked: bool,
    pub failed_attempts: u32,
    #[schema(example = "2026-01-01T08:00:00Z", format = "date-time", value_type = Option<String>)]
    pub last_login: Option<DateTime<Utc>>,
    #[schema(example = json!({ "Annual Leave": 21, "Sick Leave": 15 }))]
    pub balances: BTreeMap<String, i32>,
    pub must_change_pin: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
            department: user.department,
            branch: user.branch,
            is_active: user.is_active,
            is_approved: user.is_approved,
            is_blocked: user.is_blocked,
            failed_attempts: user.failed_attempts,
            last_login: user.last_login,
            balances: user
                .balances
                .iter()
                .map(|(leave_type, days)| (leave_type.to_string(), days))
                .collect(),
            must_change_pin: user.must_change_pin,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RosterStatus {
    /// Awaiting approval
    Pending,
    Active,
    Terminated,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct UserFilter {
    /// Filter by roster status
    pub status: Option<RosterStatus>,
    #[schema(example = "GILGIL BRANCH", value_type = Option<String>)]
    #[param(value_type = Option<String>)]
    /// Filter by branch (global tier only)
    pub branch: Option<Branch>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "Kamau")]
    pub name: String,
    #[schema(example = "4821")]
    pub pin: String,
    #[schema(example = "STAFF", value_type = String)]
    pub role: Role,
    #[schema(example = "Drivers", value_type = String)]
    pub department: Department,
    #[schema(example = "GILGIL BRANCH", value_type = String)]
    pub branch: Branch,
    /// Defaults to the standard quota table
    #[schema(example = json!({ "Annual Leave": 21 }), value_type = Option<Object>)]
    pub balances: Option<Balances>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUser {
    pub name: Option<String>,
    #[schema(example = "BRANCH_MANAGER", value_type = Option<String>)]
    pub role: Option<Role>,
    #[schema(example = "Stores", value_type = Option<String>)]
    pub department: Option<Department>,
    #[schema(example = "OLKALOU BRANCH", value_type = Option<String>)]
    pub branch: Option<Branch>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetBalances {
    #[schema(example = json!({ "Annual Leave": 18, "Sick Leave": 15 }), value_type = Object)]
    pub balances: Balances,
    #[schema(example = "Carry-over from last year")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TempPin {
    #[schema(example = "0000")]
    pub temp_pin: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateMe {
    #[schema(example = "Otieno Odhiambo")]
    pub name: String,
    /// New PIN, required after an administrative reset
    #[schema(example = "5932")]
    pub pin: Option<String>,
}

fn view_of(state: &AppState, id: &UserId) -> Result<UserView, DeskError> {
    state
        .user(id)
        .map(UserView::from)
        .ok_or_else(|| TransitionError::UnknownUser(id.to_string()).into())
}

/* =========================
Roster
========================= */
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Users the caller may manage", body = Vec<UserView>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    query: web::Query<UserFilter>,
) -> Result<HttpResponse, DeskError> {
    auth.require_manager()?;
    let actor = current_user(&desk, &auth)?;

    let users: Vec<UserView> = desk.read(|s| {
        s.users
            .iter()
            .filter(|u| actor.role.is_global() || u.branch == actor.branch)
            .filter(|u| query.branch.is_none_or(|b| u.branch == b))
            .filter(|u| match query.status {
                Some(RosterStatus::Pending) => !u.is_approved && !u.is_terminated(),
                Some(RosterStatus::Active) => u.is_in_service(),
                Some(RosterStatus::Terminated) => u.is_terminated(),
                None => true,
            })
            .map(UserView::from)
            .collect()
    });

    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created and active", body = UserView),
        (status = 403, description = "Role or branch not assignable by the caller"),
        (status = 409, description = "Name taken or manager post already filled")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    payload: web::Json<CreateUser>,
) -> Result<HttpResponse, DeskError> {
    auth.require_manager()?;
    let payload = payload.into_inner();
    let pin = Pin::parse(payload.pin.trim())?;
    let name = payload.name.clone();

    let transition = desk.dispatch(Action::Register {
        actor: Some(auth.user_id.clone()),
        registration: Registration {
            name: payload.name,
            role: payload.role,
            department: payload.department,
            branch: payload.branch,
            pin_hash: hash_pin(&pin)?,
            balances: payload.balances,
        },
    })?;

    let Subject::User(user_id) = &transition.subject else {
        return Err(TransitionError::UnknownUser(name).into());
    };
    Ok(HttpResponse::Created().json(view_of(&transition.state, user_id)?))
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    params(("user_id" = String, Path, description = "User to edit")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Updated user", body = UserView),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Unknown user"),
        (status = 409, description = "Name taken or manager post already filled")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
    payload: web::Json<UpdateUser>,
) -> Result<HttpResponse, DeskError> {
    let user_id = UserId::from(path.into_inner());
    let payload = payload.into_inner();

    let transition = desk.dispatch(Action::UpdateUser {
        actor: auth.user_id.clone(),
        user_id: user_id.clone(),
        changes: UserChanges {
            name: payload.name,
            role: payload.role,
            department: payload.department,
            branch: payload.branch,
        },
    })?;

    Ok(HttpResponse::Ok().json(view_of(&transition.state, &user_id)?))
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}/approve",
    params(("user_id" = String, Path, description = "Self-registered user to authorize")),
    responses(
        (status = 200, description = "User approved and active", body = UserView),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Manager post already filled")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn approve_user(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
) -> Result<HttpResponse, DeskError> {
    let user_id = UserId::from(path.into_inner());
    let transition = desk.dispatch(Action::ApproveUser {
        actor: auth.user_id.clone(),
        user_id: user_id.clone(),
    })?;

    Ok(HttpResponse::Ok().json(view_of(&transition.state, &user_id)?))
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}/balances",
    params(("user_id" = String, Path, description = "User whose quota is adjusted")),
    request_body = SetBalances,
    responses(
        (status = 200, description = "Balances replaced", body = UserView),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn set_balances(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
    payload: web::Json<SetBalances>,
) -> Result<HttpResponse, DeskError> {
    let user_id = UserId::from(path.into_inner());
    let payload = payload.into_inner();
    let transition = desk.dispatch(Action::SetBalances {
        actor: auth.user_id.clone(),
        user_id: user_id.clone(),
        balances: payload.balances,
        reason: payload.reason,
    })?;

    Ok(HttpResponse::Ok().json(view_of(&transition.state, &user_id)?))
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}/pin",
    params(("user_id" = String, Path, description = "User receiving a temporary PIN")),
    request_body = TempPin,
    responses(
        (status = 200, description = "Temporary PIN set, change forced at next sign-in", body = UserView),
        (status = 403, description = "Global tier only")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn reset_pin(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
    payload: web::Json<TempPin>,
) -> Result<HttpResponse, DeskError> {
    auth.require_global()?;
    let user_id = UserId::from(path.into_inner());
    let pin = Pin::parse(payload.temp_pin.trim())?;

    let transition = desk.dispatch(Action::AdminResetPin {
        actor: auth.user_id.clone(),
        user_id: user_id.clone(),
        temp_pin_hash: hash_pin(&pin)?,
    })?;

    Ok(HttpResponse::Ok().json(view_of(&transition.state, &user_id)?))
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = String, Path, description = "User to terminate")),
    responses(
        (status = 200, description = "User terminated", body = Object, example = json!({
            "message": "User terminated"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Unknown user")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn terminate_user(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
) -> Result<HttpResponse, DeskError> {
    desk.dispatch(Action::TerminateUser {
        actor: auth.user_id.clone(),
        user_id: UserId::from(path.into_inner()),
    })?;

    Ok(HttpResponse::Ok().json(json!({ "message": "User terminated" })))
}

/* =========================
Self service
========================= */
#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "The caller's own record", body = UserView)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_me(auth: AuthUser, desk: web::Data<LeaveDesk>) -> Result<HttpResponse, DeskError> {
    let me = current_user(&desk, &auth)?;
    Ok(HttpResponse::Ok().json(UserView::from(&me)))
}

#[utoipa::path(
    put,
    path = "/api/me",
    request_body = UpdateMe,
    responses(
        (status = 200, description = "Profile updated", body = UserView),
        (status = 400, description = "Empty name or malformed PIN"),
        (status = 409, description = "Name taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_me(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    payload: web::Json<UpdateMe>,
) -> Result<HttpResponse, DeskError> {
    let payload = payload.into_inner();
    let pin_hash = match payload.pin.as_deref() {
        Some(raw) => Some(hash_pin(&Pin::parse(raw.trim())?)?),
        None => None,
    };

    let transition = desk.dispatch(Action::UpdateSelf {
        actor: auth.user_id.clone(),
        name: payload.name,
        pin_hash,
    })?;

    Ok(HttpResponse::Ok().json(view_of(&transition.state, &auth.user_id)?))
}
