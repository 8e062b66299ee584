use crate::api::leave_request::{
    BulkApprove, CreateLeave, Decision, EvaluationResponse, LeaveFilter, LeaveListResponse,
    LeaveView, Reschedule,
};
use crate::api::notifications::NotificationView;
use crate::api::system::{ConfirmPhrase, ConfirmPin, ConfirmToken};
use crate::api::users::{
    CreateUser, RosterStatus, SetBalances, TempPin, UpdateMe, UpdateUser, UserFilter, UserView,
};
use crate::auth::session::{SessionPhase, SessionStatus};
use crate::models::{LoginReqDto, LoginResponse, RecoverReqDto, RegisterReqDto};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Desk API",
        version = "1.0.0",
        description = r#"
## Staff Leave Desk

Leave requests and approvals for a multi-branch organization.

### 🔹 Key Features
- **Leave**
  - Apply by explicit days or by range, with balance and team conflict checks
  - Approve, reject, bulk approve and reschedule
- **Personnel**
  - Register, approve, edit, terminate and adjust quotas within your authority
- **Recovery**
  - Forgotten PIN tickets and temporary PINs issued by global administrators
- **Audit & Notifications**
  - Every change is recorded; affected people are notified

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** token from `/auth/login`.
Sessions expire after 10 minutes of inactivity.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::register,
        crate::auth::handlers::recover,
        crate::auth::handlers::session_status,
        crate::auth::handlers::session_extend,
        crate::auth::handlers::logout,

        crate::api::users::list_users,
        crate::api::users::create_user,
        crate::api::users::update_user,
        crate::api::users::approve_user,
        crate::api::users::set_balances,
        crate::api::users::reset_pin,
        crate::api::users::terminate_user,
        crate::api::users::get_me,
        crate::api::users::update_me,

        crate::api::leave_request::list_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::evaluate_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::bulk_approve,
        crate::api::leave_request::update_dates,

        crate::api::notifications::list_notifications,
        crate::api::notifications::clear_notification,

        crate::api::resets::list_reset_requests,
        crate::api::resets::resolve_reset_request,

        crate::api::audit::list_audit,

        crate::api::system::trigger_reset,
        crate::api::system::confirm_pin,
        crate::api::system::confirm_token,
        crate::api::system::execute_reset,
        crate::api::system::cancel_reset
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            RegisterReqDto,
            RecoverReqDto,
            SessionPhase,
            SessionStatus,
            UserView,
            UserFilter,
            RosterStatus,
            CreateUser,
            UpdateUser,
            SetBalances,
            TempPin,
            UpdateMe,
            LeaveView,
            LeaveFilter,
            LeaveListResponse,
            CreateLeave,
            Reschedule,
            Decision,
            BulkApprove,
            EvaluationResponse,
            NotificationView,
            ConfirmPin,
            ConfirmToken,
            ConfirmPhrase
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Sign in, self-registration, PIN recovery and session timer"),
        (name = "Users", description = "Personnel management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Notifications", description = "Per-user inbox"),
        (name = "Recovery", description = "PIN reset tickets"),
        (name = "Audit", description = "Audit trail"),
        (name = "System", description = "Full system reset ceremony"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
