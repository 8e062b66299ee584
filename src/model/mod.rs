pub mod audit_log;
pub mod branch;
pub mod department;
pub mod ids;
pub mod leave_request;
pub mod notification;
pub mod reset_request;
pub mod role;
pub mod state;
pub mod user;

pub use audit_log::AuditLog;
pub use branch::Branch;
pub use department::Department;
pub use ids::{AuditId, NotificationId, RequestId, ResetRequestId, UserId};
pub use leave_request::{LeaveDates, LeaveRequest, LeaveStatus, LeaveType};
pub use notification::Notification;
pub use reset_request::{ResetRequest, ResetStatus};
pub use role::Role;
pub use state::AppState;
pub use user::{Balances, Pin, Registration, User, UserChanges, normalize_name};
