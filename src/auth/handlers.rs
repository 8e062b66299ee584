use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::{
    api::users::UserView,
    auth::{
        jwt::generate_access_token, middleware::bearer_claims, password::hash_pin,
        session::{SessionRegistry, SessionStatus},
    },
    config::Config,
    engine::{Action, Subject},
    error::{AuthError, DeskError},
    model::{Pin, Registration, Role},
    models::{LoginReqDto, LoginResponse, RecoverReqDto, RegisterReqDto},
    store::LeaveDesk,
};

fn session_key(req: &HttpRequest, config: &Config) -> Result<String, DeskError> {
    bearer_claims(req, &config.jwt_secret)
        .map(|claims| claims.jti)
        .map_err(|e| {
            debug!(reason = e, "session lookup without a valid token");
            AuthError::InvalidToken.into()
        })
}

/* =========================
Sign in
========================= */
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "PIN is not 4 digits"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account blocked or awaiting approval")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(desk, config, sessions, user),
    fields(name = %user.name)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    desk: web::Data<LeaveDesk>,
    config: web::Data<Config>,
    sessions: web::Data<SessionRegistry>,
) -> Result<HttpResponse, DeskError> {
    info!("Login request received");

    // 1️⃣ Basic validation
    let pin = Pin::parse(user.pin.trim())?;

    // 2️⃣ Check credentials, counting failures
    let now = Utc::now();
    let signed_in = desk.authenticate(&user.name, &pin, now).await.map_err(|e| {
        info!(error = %e, "Login refused");
        e
    })?;

    // 3️⃣ Issue token and open the session
    let (access_token, claims) =
        generate_access_token(&signed_in, &config.jwt_secret, config.access_token_ttl)
            .map_err(|e| DeskError::Credential(e.to_string()))?;
    let session = sessions.open(&claims.jti, now);

    info!(user_id = %signed_in.id, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        expires_in: config.access_token_ttl,
        must_change_pin: signed_in.must_change_pin,
        user: UserView::from(&signed_in),
        session,
    }))
}

/* =========================
Self registration
========================= */
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReqDto,
    responses(
        (status = 201, description = "Registered, awaiting approval", body = Object,
         example = json!({
            "message": "Registration submitted for approval",
            "id": "3f1c2a9e-0b8d-4c52-9d61-1f0e4b7a2c11"
         })
        ),
        (status = 400, description = "Invalid name or PIN"),
        (status = 409, description = "Name already on the roster")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(desk, payload), fields(name = %payload.name))]
pub async fn register(
    payload: web::Json<RegisterReqDto>,
    desk: web::Data<LeaveDesk>,
) -> Result<HttpResponse, DeskError> {
    let payload = payload.into_inner();
    let pin = Pin::parse(payload.pin.trim())?;

    let transition = desk.dispatch(Action::Register {
        actor: None,
        registration: Registration {
            name: payload.name,
            role: Role::Staff,
            department: payload.department,
            branch: payload.branch,
            pin_hash: hash_pin(&pin)?,
            balances: None,
        },
    })?;

    let id = match transition.subject {
        Subject::User(id) => Some(id),
        _ => None,
    };
    info!(user_id = ?id, "Self-registration submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Registration submitted for approval",
        "id": id,
    })))
}

/* =========================
Forgotten PIN
========================= */
#[utoipa::path(
    post,
    path = "/auth/recover",
    request_body = RecoverReqDto,
    responses(
        (status = 201, description = "Reset request queued for administrators", body = Object,
         example = json!({ "message": "Reset request submitted" })
        ),
        (status = 400, description = "Empty name")
    ),
    tag = "Auth"
)]
pub async fn recover(
    payload: web::Json<RecoverReqDto>,
    desk: web::Data<LeaveDesk>,
) -> Result<HttpResponse, DeskError> {
    let payload = payload.into_inner();
    desk.dispatch(Action::SubmitResetRequest {
        name: payload.name,
        department: payload.department,
    })?;

    Ok(HttpResponse::Created().json(json!({ "message": "Reset request submitted" })))
}

/* =========================
Session timer
========================= */
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Current phase of the inactivity timer", body = SessionStatus),
        (status = 401, description = "Session expired or token invalid")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn session_status(
    req: HttpRequest,
    config: web::Data<Config>,
    sessions: web::Data<SessionRegistry>,
) -> Result<HttpResponse, DeskError> {
    let key = session_key(&req, &config)?;
    let status = sessions.status(&key, Utc::now())?;
    Ok(HttpResponse::Ok().json(status))
}

#[utoipa::path(
    post,
    path = "/auth/session/extend",
    responses(
        (status = 200, description = "Timer restarted", body = SessionStatus),
        (status = 401, description = "Session already expired")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn session_extend(
    req: HttpRequest,
    config: web::Data<Config>,
    sessions: web::Data<SessionRegistry>,
) -> Result<HttpResponse, DeskError> {
    let key = session_key(&req, &config)?;
    let status = sessions.extend(&key, Utc::now())?;
    Ok(HttpResponse::Ok().json(status))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Session closed")),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    config: web::Data<Config>,
    sessions: web::Data<SessionRegistry>,
) -> HttpResponse {
    // idempotent, even without a valid token
    if let Ok(key) = session_key(&req, &config) {
        sessions.close(&key);
    }
    HttpResponse::NoContent().finish()
}
