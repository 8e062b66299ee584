pub mod audit;
pub mod leave_request;
pub mod notifications;
pub mod resets;
pub mod system;
pub mod users;

use crate::auth::auth::AuthUser;
use crate::error::{DeskError, TransitionError};
use crate::model::User;
use crate::store::LeaveDesk;

/// The caller's live record. A token outliving termination or blocking is refused.
pub(crate) fn current_user(desk: &LeaveDesk, auth: &AuthUser) -> Result<User, DeskError> {
    let user = desk
        .read(|s| s.user(&auth.user_id).cloned())
        .ok_or_else(|| TransitionError::UnknownUser(auth.user_id.to_string()))?;
    if !user.is_in_service() {
        return Err(TransitionError::InactiveAccount.into());
    }
    Ok(user)
}
