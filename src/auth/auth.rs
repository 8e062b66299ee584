use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

use crate::error::TransitionError;
use crate::model::{Role, UserId};

/// The signed-in caller, placed in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub name: String,
    pub role: Role,
    /// Token id, also the session key.
    pub session: String,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(ErrorUnauthorized("Missing token"))),
        }
    }
}

impl AuthUser {
    /// Cheap pre-check from the token role; the reducer re-checks against live state.
    pub fn require_manager(&self) -> Result<(), TransitionError> {
        if self.role.is_manager() {
            Ok(())
        } else {
            Err(TransitionError::Forbidden("managers only".to_string()))
        }
    }

    pub fn require_global(&self) -> Result<(), TransitionError> {
        if self.role.is_global() {
            Ok(())
        } else {
            Err(TransitionError::Forbidden(
                "super admin or operations manager only".to_string(),
            ))
        }
    }
}
