//! Full system reset, walked through one request per ceremony step.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::engine::CONFIRMATION_PHRASE;
use crate::error::DeskError;
use crate::model::Pin;
use crate::store::LeaveDesk;

#[derive(Deserialize, ToSchema)]
pub struct ConfirmPin {
    #[schema(example = "4821")]
    pub pin: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ConfirmToken {
    #[schema(example = "7314")]
    pub token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ConfirmPhrase {
    #[schema(example = "RESET DATABASE CONFIRMED")]
    pub phrase: String,
}

#[utoipa::path(
    post,
    path = "/api/system/reset",
    responses(
        (status = 200, description = "Ceremony opened; the one-time token must be typed back", body = Object,
         example = json!({ "token": "7314", "next": "pin" })
        ),
        (status = 403, description = "Not the super administrator, or the sign-in is too old"),
        (status = 429, description = "Too many reset attempts this hour")
    ),
    security(("bearer_auth" = [])),
    tag = "System"
)]
#[instrument(name = "system_reset_trigger", skip(auth, desk), fields(actor = %auth.user_id))]
pub async fn trigger_reset(auth: AuthUser, desk: web::Data<LeaveDesk>) -> Result<HttpResponse, DeskError> {
    let token = desk.trigger_reset(&auth.user_id, Utc::now())?;
    warn!("System reset ceremony opened");

    Ok(HttpResponse::Ok().json(json!({
        "token": token.to_string(),
        "next": "pin",
    })))
}

#[utoipa::path(
    post,
    path = "/api/system/reset/pin",
    request_body = ConfirmPin,
    responses(
        (status = 200, description = "PIN confirmed", body = Object, example = json!({ "next": "token" })),
        (status = 403, description = "PIN mismatch; the ceremony is closed"),
        (status = 409, description = "No ceremony open or step out of order")
    ),
    security(("bearer_auth" = [])),
    tag = "System"
)]
pub async fn confirm_pin(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    payload: web::Json<ConfirmPin>,
) -> Result<HttpResponse, DeskError> {
    let pin = Pin::parse(payload.pin.trim())?;
    desk.confirm_reset_pin(&auth.user_id, &pin)?;
    Ok(HttpResponse::Ok().json(json!({ "next": "token" })))
}

#[utoipa::path(
    post,
    path = "/api/system/reset/token",
    request_body = ConfirmToken,
    responses(
        (status = 200, description = "Token confirmed", body = Object, example = json!({
            "next": "phrase",
            "phrase": "RESET DATABASE CONFIRMED"
        })),
        (status = 403, description = "Token mismatch; the ceremony is closed"),
        (status = 409, description = "No ceremony open or step out of order")
    ),
    security(("bearer_auth" = [])),
    tag = "System"
)]
pub async fn confirm_token(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    payload: web::Json<ConfirmToken>,
) -> Result<HttpResponse, DeskError> {
    desk.confirm_reset_token(&auth.user_id, &payload.token)?;
    Ok(HttpResponse::Ok().json(json!({
        "next": "phrase",
        "phrase": CONFIRMATION_PHRASE,
    })))
}

#[utoipa::path(
    post,
    path = "/api/system/reset/execute",
    request_body = ConfirmPhrase,
    responses(
        (status = 200, description = "Everything except the actor's own account was wiped", body = Object,
         example = json!({ "message": "System reset complete" })
        ),
        (status = 403, description = "Phrase mismatch; the ceremony is closed"),
        (status = 409, description = "No ceremony open or step out of order")
    ),
    security(("bearer_auth" = [])),
    tag = "System"
)]
#[instrument(name = "system_reset_execute", skip(auth, desk, payload), fields(actor = %auth.user_id))]
pub async fn execute_reset(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    payload: web::Json<ConfirmPhrase>,
) -> Result<HttpResponse, DeskError> {
    let transition = desk.execute_reset(&auth.user_id, &payload.phrase, Utc::now())?;
    warn!(
        remaining_users = transition.state.users.len(),
        "System reset executed"
    );

    Ok(HttpResponse::Ok().json(json!({ "message": "System reset complete" })))
}

#[utoipa::path(
    delete,
    path = "/api/system/reset",
    responses((status = 204, description = "Any open ceremony abandoned")),
    security(("bearer_auth" = [])),
    tag = "System"
)]
pub async fn cancel_reset(auth: AuthUser, desk: web::Data<LeaveDesk>) -> HttpResponse {
    desk.cancel_reset(&auth.user_id);
    HttpResponse::NoContent().finish()
}
