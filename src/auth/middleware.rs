use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::auth::session::SessionRegistry;
use crate::config::Config;
use crate::models::Claims;

fn unauthorized(req: ServiceRequest, body: serde_json::Value) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(body);
    req.into_response(resp.map_into_boxed_body())
}

/// Bearer token from the `Authorization` header, verified.
pub fn bearer_claims(req: &actix_web::HttpRequest, secret: &str) -> Result<Claims, &'static str> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must start with Bearer")?;
    verify_token(token, secret).map_err(|_| "Invalid or expired token")
}

/// Verifies the token and counts the request as session activity.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?
        .clone();
    let sessions = req
        .app_data::<Data<SessionRegistry>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Session registry missing"))?
        .clone();

    let claims = match bearer_claims(req.request(), &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => return Ok(unauthorized(req, json!({ "error": e }))),
    };

    if let Err(e) = sessions.touch(&claims.jti, Utc::now()) {
        tracing::debug!(user_id = %claims.user_id, "request on expired session");
        return Ok(unauthorized(req, json!({ "error": e.to_string() })));
    }

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id.into(),
        name: claims.sub,
        role: claims.role,
        session: claims.jti,
    });

    next.call(req).await
}
