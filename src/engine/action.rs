use crate::engine::system_reset::ResetAuthorization;
use crate::model::{
    Balances, Department, LeaveDates, LeaveStatus, LeaveType, NotificationId, Registration,
    RequestId, ResetRequestId, UserChanges, UserId,
};

/// Everything that can change the desk. `actor` is the signed-in user the
/// action is performed by.
#[derive(Debug)]
pub enum Action {
    Login {
        user_id: UserId,
    },
    RecordFailedAttempt {
        name: String,
        lock_after: u32,
    },
    /// `actor: None` is self-registration.
    Register {
        actor: Option<UserId>,
        registration: Registration,
    },
    ApproveUser {
        actor: UserId,
        user_id: UserId,
    },
    UpdateUser {
        actor: UserId,
        user_id: UserId,
        changes: UserChanges,
    },
    SetBalances {
        actor: UserId,
        user_id: UserId,
        balances: Balances,
        reason: String,
    },
    TerminateUser {
        actor: UserId,
        user_id: UserId,
    },
    SubmitLeave {
        actor: UserId,
        leave_type: LeaveType,
        dates: LeaveDates,
        reason: String,
    },
    UpdateLeaveStatus {
        actor: UserId,
        request_id: RequestId,
        status: LeaveStatus,
        comment: Option<String>,
    },
    BulkApprove {
        actor: UserId,
        request_ids: Vec<RequestId>,
    },
    UpdateLeaveDates {
        actor: UserId,
        request_id: RequestId,
        dates: LeaveDates,
    },
    ClearNotification {
        actor: UserId,
        notification_id: NotificationId,
    },
    /// Own name and, optionally, a new PIN hash.
    UpdateSelf {
        actor: UserId,
        name: String,
        pin_hash: Option<String>,
    },
    SubmitResetRequest {
        name: String,
        department: Department,
    },
    AdminResetPin {
        actor: UserId,
        user_id: UserId,
        temp_pin_hash: String,
    },
    ResolveResetRequest {
        actor: UserId,
        reset_id: ResetRequestId,
    },
    /// Only obtainable by completing the reset ceremony.
    ResetSystem(ResetAuthorization),
}

impl Action {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Login { .. } => "login",
            Action::RecordFailedAttempt { .. } => "record_failed_attempt",
            Action::Register { .. } => "register",
            Action::ApproveUser { .. } => "approve_user",
            Action::UpdateUser { .. } => "update_user",
            Action::SetBalances { .. } => "set_balances",
            Action::TerminateUser { .. } => "terminate_user",
            Action::SubmitLeave { .. } => "submit_leave",
            Action::UpdateLeaveStatus { .. } => "update_leave_status",
            Action::BulkApprove { .. } => "bulk_approve",
            Action::UpdateLeaveDates { .. } => "update_leave_dates",
            Action::ClearNotification { .. } => "clear_notification",
            Action::UpdateSelf { .. } => "update_self",
            Action::SubmitResetRequest { .. } => "submit_reset_request",
            Action::AdminResetPin { .. } => "admin_reset_pin",
            Action::ResolveResetRequest { .. } => "resolve_reset_request",
            Action::ResetSystem(_) => "reset_system",
        }
    }
}
