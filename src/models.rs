use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::users::UserView;
use crate::auth::session::SessionStatus;
use crate::model::{Branch, Department, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    /// Display name at sign-in time.
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
    /// Also the session key.
    pub jti: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "Otieno")]
    pub name: String,
    #[schema(example = "1234")]
    pub pin: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    #[schema(example = 900)]
    pub expires_in: usize,
    /// Set after an administrative PIN reset.
    pub must_change_pin: bool,
    pub user: UserView,
    pub session: SessionStatus,
}

/// Self-registration from the sign-in screen. Always creates staff.
#[derive(Deserialize, ToSchema)]
pub struct RegisterReqDto {
    #[schema(example = "Otieno")]
    pub name: String,
    #[schema(example = "1234")]
    pub pin: String,
    #[schema(example = "Sales", value_type = String)]
    pub department: Department,
    #[schema(example = "NAIVASHA BRANCH", value_type = String)]
    pub branch: Branch,
}

#[derive(Deserialize, ToSchema)]
pub struct RecoverReqDto {
    #[schema(example = "Otieno")]
    pub name: String,
    #[schema(example = "Sales", value_type = String)]
    pub department: Department,
}
