use serde::{Deserialize, Serialize};

use crate::model::{
    AuditLog, Branch, LeaveRequest, Notification, RequestId, ResetRequest, ResetRequestId,
    ResetStatus, Role, User, UserId,
};

/// Every persistent entity of the desk. Sessions are not part of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub users: Vec<User>,
    pub requests: Vec<LeaveRequest>,
    pub audit_logs: Vec<AuditLog>,
    pub notifications: Vec<Notification>,
    pub reset_requests: Vec<ResetRequest>,
}

impl AppState {
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    pub fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| &u.id == id)
    }

    /// Looks a name up among users that have not been terminated.
    pub fn roster_user(&self, name: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| !u.is_terminated() && u.answers_to(name))
    }

    pub fn request(&self, id: &RequestId) -> Option<&LeaveRequest> {
        self.requests.iter().find(|r| &r.id == id)
    }

    pub fn request_mut(&mut self, id: &RequestId) -> Option<&mut LeaveRequest> {
        self.requests.iter_mut().find(|r| &r.id == id)
    }

    pub fn reset_request(&self, id: &ResetRequestId) -> Option<&ResetRequest> {
        self.reset_requests.iter().find(|r| &r.id == id)
    }

    /// Active super admin, operations manager and branch managers.
    pub fn managers(&self) -> impl Iterator<Item = &User> {
        self.users
            .iter()
            .filter(|u| u.role.is_manager() && u.is_in_service())
    }

    /// Active super admin and operations manager.
    pub fn global_admins(&self) -> impl Iterator<Item = &User> {
        self.users
            .iter()
            .filter(|u| u.role.is_global() && u.is_in_service())
    }

    pub fn active_operations_manager(&self) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.role == Role::OperationsManager && u.is_active)
    }

    pub fn active_branch_manager(&self, branch: Branch) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.role == Role::BranchManager && u.branch == branch && u.is_active)
    }

    pub fn pending_resets(&self) -> impl Iterator<Item = &ResetRequest> {
        self.reset_requests
            .iter()
            .filter(|r| r.status == ResetStatus::Pending)
    }

    pub fn notifications_for<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> impl Iterator<Item = &'a Notification> + 'a {
        self.notifications.iter().filter(move |n| &n.user_id == user_id)
    }

    pub fn requests_of<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> impl Iterator<Item = &'a LeaveRequest> + 'a {
        self.requests.iter().filter(move |r| &r.user_id == user_id)
    }
}
